//! Recipe evaluation command: `recipe-feed evaluate`.

use std::path::Path;

use anyhow::{Context, Result};

use recipe_feed::config::Config;
use recipe_feed::gemini::GeminiClient;
use recipe_feed::models::RecipeDocument;
use recipe_feed::transform::{is_evaluation_passed, normalize_recipe, recipe_to_yaml};

pub async fn cmd_evaluate(config: &Config, recipe_path: &Path, fix: bool) -> Result<()> {
    let client = GeminiClient::from_key(config.gemini_api_key.as_deref())?;

    let raw = std::fs::read_to_string(recipe_path)
        .with_context(|| format!("Failed to read {}", recipe_path.display()))?;
    let document: RecipeDocument = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", recipe_path.display()))?;

    let normalized = normalize_recipe(document);
    let yaml = recipe_to_yaml(&normalized).context("Failed to render recipe YAML")?;

    if fix && yaml != raw {
        std::fs::write(recipe_path, &yaml)
            .with_context(|| format!("Failed to write {}", recipe_path.display()))?;
        println!("Normalized {}", recipe_path.display());
    }

    println!("Evaluating {}...", recipe_path.display());
    let evaluation = client.evaluate_recipe(&yaml).await?;

    println!();
    println!("{}", evaluation);
    println!();
    if is_evaluation_passed(&evaluation) {
        println!("Result: passed");
    } else {
        println!("Result: changes suggested");
    }
    Ok(())
}
