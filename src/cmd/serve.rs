//! API server command: `recipe-feed serve`.

use std::sync::Arc;

use anyhow::Result;

use recipe_feed::auth::AuthOptions;
use recipe_feed::backend::{Backend, SupabaseClient};
use recipe_feed::config::Config;
use recipe_feed::server::{AppState, ServerConfig, start_server};

pub async fn cmd_serve(config: &Config, port: u16, dev: bool) -> Result<()> {
    let backend = SupabaseClient::from_settings(&config.backend)
        .map(|client| Arc::new(client) as Arc<dyn Backend>);

    let state = AppState {
        backend,
        edit_token: config.edit_token.clone(),
        auth: AuthOptions::default(),
    };

    start_server(ServerConfig { port, dev_mode: dev }, state).await
}
