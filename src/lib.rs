pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod errors;
pub mod favorites;
pub mod feed;
pub mod gemini;
pub mod logging;
pub mod models;
pub mod seed;
pub mod server;
pub mod shuffle;
pub mod store;
pub mod sync;
pub mod transform;
