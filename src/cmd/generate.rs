//! Recipe generation command: `recipe-feed generate`.

use std::path::Path;

use anyhow::{Context, Result};

use recipe_feed::config::Config;
use recipe_feed::gemini::{GeminiClient, GenerateOptions};
use recipe_feed::models::{GeneratedRecipe, RecipeDocument};
use recipe_feed::transform::recipe_to_yaml;

fn to_document(recipe: &GeneratedRecipe) -> RecipeDocument {
    RecipeDocument {
        title: recipe.title.clone(),
        summary: recipe.summary.clone(),
        servings: recipe.servings,
        prep_time_minutes: recipe.prep_time_minutes,
        cook_time_minutes: recipe.cook_time_minutes,
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        tags: recipe.tags.clone(),
    }
}

/// Generate a recipe and print it as JSON, or save it as a recipe document
/// under `save_dir/<slug>/<slug>.yaml`.
pub async fn cmd_generate(
    config: &Config,
    options: GenerateOptions,
    save_dir: Option<&Path>,
) -> Result<()> {
    let options = options
        .cleaned()
        .context("Title, description, and at least one tag are required.")?;
    let client = GeminiClient::from_key(config.gemini_api_key.as_deref())?;

    eprintln!("Generating \"{}\"...", options.title);
    let recipe = client.generate_recipe(&options).await?;

    let Some(dir) = save_dir else {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    };

    let folder = dir.join(&recipe.slug);
    std::fs::create_dir_all(&folder)
        .with_context(|| format!("Failed to create {}", folder.display()))?;
    let path = folder.join(format!("{}.yaml", recipe.slug));
    let yaml = recipe_to_yaml(&to_document(&recipe)).context("Failed to render recipe YAML")?;
    std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}
