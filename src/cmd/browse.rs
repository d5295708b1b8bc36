//! Feed browsing commands: `recipe-feed feed`, `show`, `random`, `delete`.

use anyhow::{Context, Result, bail};

use recipe_feed::backend::SupabaseClient;
use recipe_feed::backend::storage::resolve_image_url;
use recipe_feed::client::ApiClient;
use recipe_feed::config::Config;
use recipe_feed::favorites::Favorites;
use recipe_feed::feed::{FeedLoader, LoadState, RecipeLoader};
use recipe_feed::models::RecipeListItem;
use recipe_feed::shuffle::{seeded_shuffle, today_seed};
use recipe_feed::store::RecipeStore;
use recipe_feed::transform::{
    format_recipe_for_prompt, generated_recipe_to_feed_card_props, recipe_data_to_generated_recipe,
    slugify,
};

/// The persistent cache, or an in-memory one when the file cannot be opened.
fn open_store(config: &Config) -> RecipeStore {
    match RecipeStore::open_sqlite(&config.cache_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                "Recipe cache at {} unavailable, continuing without persistence: {}",
                config.cache_path.display(),
                e
            );
            RecipeStore::in_memory()
        }
    }
}

fn format_minutes(label: &str, minutes: Option<u32>) -> Option<String> {
    minutes.filter(|m| *m > 0).map(|m| format!("{} {}m", label, m))
}

fn print_item(item: &RecipeListItem, favorite: bool) {
    let marker = if favorite { "*" } else { " " };
    let mut details: Vec<String> = Vec::new();
    if !item.tags.is_empty() {
        details.push(format!("[{}]", item.tags.join(", ")));
    }
    details.extend(format_minutes("prep", item.prep_time_minutes));
    details.extend(format_minutes("cook", item.cook_time_minutes));
    println!("{} {:<40} {}  {}", marker, item.slug, item.name, details.join(" "));
}

pub async fn cmd_feed(config: &Config, pages: u32, offline: bool, shuffle: bool) -> Result<()> {
    let mut store = open_store(config);
    let client = ApiClient::new(&config.api_base_url);
    let mut loader = FeedLoader::new();

    if !offline {
        loader.load_initial(&mut store, &client).await;
        for _ in 1..pages {
            if !loader.load_more(&mut store, &client).await {
                break;
            }
        }
        if let Some(error) = loader.error() {
            eprintln!("Could not refresh the feed ({}); showing cached recipes.", error);
        }
    }

    let view = loader.view(&store, true);
    let mut items = view.display;
    if shuffle {
        items = seeded_shuffle(&items, today_seed());
    }

    if items.is_empty() {
        println!("No recipes yet.");
        return Ok(());
    }

    let favorites = Favorites::new(config.favorites_path());
    let favorite_slugs = favorites.all();
    for item in &items {
        print_item(item, favorite_slugs.contains(&item.slug));
    }

    if let Some(pagination) = loader.pagination() {
        println!();
        println!(
            "Page {} of {} ({} recipes){}",
            pagination.page,
            pagination.total_pages,
            pagination.total,
            if pagination.has_more { ", more available" } else { "" }
        );
    }
    Ok(())
}

pub async fn cmd_show(config: &Config, slug_or_name: &str, json: bool) -> Result<()> {
    let slug = slugify(slug_or_name);
    if slug.is_empty() {
        bail!("'{}' is not a valid recipe slug", slug_or_name);
    }

    let mut store = open_store(config);
    let client = ApiClient::new(&config.api_base_url);
    let mut loader = RecipeLoader::new();

    let mut full = match loader.load(&slug, &mut store, &client).await {
        LoadState::Ready(full) => full.clone(),
        LoadState::NotFound => bail!("Recipe '{}' not found", slug),
        LoadState::Failed(message) => bail!("Failed to load recipe '{}': {}", slug, message),
        LoadState::Idle | LoadState::Loading => bail!("Recipe '{}' did not load", slug),
    };

    let storage = config
        .backend
        .url
        .as_ref()
        .and_then(|_| SupabaseClient::from_settings(&config.backend));
    full.image_url = resolve_image_url(storage.as_ref(), full.image_url.as_deref());

    if json {
        let recipe = recipe_data_to_generated_recipe(&full);
        let card = generated_recipe_to_feed_card_props(&recipe);
        let payload = serde_json::json!({ "card": card, "recipe": recipe });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}", format_recipe_for_prompt(&full));
    if let Some(url) = &full.image_url {
        println!("Image: {}", url);
    }
    if Favorites::new(config.favorites_path()).is_favorite(&slug) {
        println!("★ Favorite");
    }
    Ok(())
}

pub async fn cmd_random(config: &Config, exclude: Option<&str>) -> Result<()> {
    let client = ApiClient::new(&config.api_base_url);
    let slug = client.random_recipe(exclude).await?;
    println!("{}", slug);
    Ok(())
}

pub async fn cmd_delete(config: &Config, slug: &str) -> Result<()> {
    let edit_token = config
        .require_edit_token()
        .context("EDIT_TOKEN is required. Set it in .env.local or as an environment variable.")?;

    println!("Deleting recipe with slug: {}", slug);
    let client = ApiClient::new(&config.api_base_url);
    let message = client
        .delete_recipe(slug, edit_token)
        .await
        .with_context(|| format!("Error deleting recipe {}", slug))?;

    let mut store = open_store(config);
    store.remove(slug);

    println!("Successfully deleted recipe: {}", slug);
    if let Some(message) = message {
        println!("{}", message);
    }
    Ok(())
}
