//! Upsert script for the `recipes` table, built from the recipe documents
//! kept under `data/recipes/<slug>/<slug>.yaml`.

use std::path::Path;

use anyhow::{Context, Result};
use glob::glob;

use crate::models::RecipeDocument;
use crate::transform::build_instructions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub ingredients: String,
    pub instructions: String,
    pub image_path: String,
    pub tags: Vec<String>,
}

impl SeedRecord {
    pub fn from_document(slug: &str, doc: &RecipeDocument, bucket: &str) -> Result<Self> {
        let ingredients = serde_json::to_string(&doc.ingredients)
            .with_context(|| format!("Failed to encode ingredients for {}", slug))?;
        let name = if doc.title.trim().is_empty() {
            slug.to_string()
        } else {
            doc.title.clone()
        };

        Ok(Self {
            slug: slug.to_string(),
            name,
            description: doc.summary.clone().unwrap_or_default(),
            ingredients,
            instructions: build_instructions(&doc.instructions),
            image_path: format!("{}/{}.jpg", bucket, slug),
            tags: doc.tags.clone(),
        })
    }

    fn to_values_row(&self) -> String {
        format!(
            "  ('{}', '{}', '{}', '{}', '{}', '{}', {})",
            escape_sql(&self.slug),
            escape_sql(&self.name),
            escape_sql(&self.description),
            escape_sql(&self.ingredients),
            escape_sql(&self.instructions),
            escape_sql(&self.image_path),
            tags_sql(&self.tags),
        )
    }
}

pub fn escape_sql(value: &str) -> String {
    value.replace('\'', "''")
}

fn tags_sql(tags: &[String]) -> String {
    if tags.is_empty() {
        return "array[]::text[]".to_string();
    }
    let quoted: Vec<String> = tags
        .iter()
        .map(|tag| format!("'{}'", escape_sql(tag)))
        .collect();
    format!("array[{}]", quoted.join(", "))
}

pub fn build_seed_sql(records: &[SeedRecord]) -> String {
    let rows: Vec<String> = records.iter().map(SeedRecord::to_values_row).collect();
    [
        "insert into public.recipes (slug, name, description, ingredients, instructions, image_url, tags)",
        "values",
        &rows.join(",\n"),
        "",
        "on conflict (slug) do update set",
        "  name = excluded.name,",
        "  description = excluded.description,",
        "  ingredients = excluded.ingredients,",
        "  instructions = excluded.instructions,",
        "  image_url = excluded.image_url,",
        "  tags = excluded.tags;",
        "",
    ]
    .join("\n")
}

/// Read every `<dir>/<slug>/<slug>.yaml` document into seed records, sorted
/// by slug. Unreadable documents are skipped with a warning.
pub fn load_recipe_dir(dir: &Path, bucket: &str) -> Result<Vec<SeedRecord>> {
    let pattern = dir.join("*").join("*.yaml").to_string_lossy().to_string();
    let mut records = Vec::new();

    for entry in glob(&pattern).context("Failed to read glob pattern")? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };

        let Some(slug) = recipe_slug(&path) else {
            continue;
        };

        let parsed = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|content| {
                serde_yaml::from_str::<RecipeDocument>(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))
            })
            .and_then(|doc| SeedRecord::from_document(&slug, &doc, bucket));

        match parsed {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping {}: {:#}", slug, e),
        }
    }

    records.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(records)
}

/// The slug for `<slug>/<slug>.yaml`; other YAML files in a recipe folder are
/// not recipe documents.
fn recipe_slug(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let parent = path.parent()?.file_name()?.to_str()?;
    (stem == parent).then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn record(slug: &str, tags: &[&str]) -> SeedRecord {
        SeedRecord {
            slug: slug.to_string(),
            name: "Nonna's Ragù".to_string(),
            description: "Slow".to_string(),
            ingredients: "[]".to_string(),
            instructions: "1. Simmer".to_string(),
            image_path: format!("recipe-images/{}.jpg", slug),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_escape_sql_doubles_quotes() {
        assert_eq!(escape_sql("it's"), "it''s");
        assert_eq!(escape_sql("plain"), "plain");
    }

    #[test]
    fn test_build_seed_sql_layout() {
        let sql = build_seed_sql(&[record("ragu", &["italian", "o'clock"]), record("toast", &[])]);
        let expected = "insert into public.recipes (slug, name, description, ingredients, instructions, image_url, tags)\n\
values\n  ('ragu', 'Nonna''s Ragù', 'Slow', '[]', '1. Simmer', 'recipe-images/ragu.jpg', array['italian', 'o''clock']),\n  \
('toast', 'Nonna''s Ragù', 'Slow', '[]', '1. Simmer', 'recipe-images/toast.jpg', array[]::text[])\n\
\n\
on conflict (slug) do update set\n  name = excluded.name,\n  description = excluded.description,\n  \
ingredients = excluded.ingredients,\n  instructions = excluded.instructions,\n  image_url = excluded.image_url,\n  \
tags = excluded.tags;\n";
        assert_eq!(sql, expected);
    }

    #[test]
    fn test_load_recipe_dir_reads_sorts_and_skips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let write = |slug: &str, file: &str, body: &str| -> Result<()> {
            let folder = dir.path().join(slug);
            fs::create_dir_all(&folder)?;
            fs::write(folder.join(file), body)?;
            Ok(())
        };

        write(
            "zucchini-fritters",
            "zucchini-fritters.yaml",
            "title: Zucchini Fritters\nsummary: Crisp\ningredients:\n  - name: zucchini\n    amount: 2 medium\ninstructions:\n  - step: 1\n    action: Grate\ntags: [vegetarian]\n",
        )?;
        write(
            "apple-pie",
            "apple-pie.yaml",
            "title: Apple Pie\ningredients: []\ninstructions:\n  - action: Bake\n",
        )?;
        write("broken", "broken.yaml", "title: [unclosed\n")?;
        write("apple-pie", "notes.yaml", "title: Not a recipe\n")?;

        let records = load_recipe_dir(dir.path(), "recipe-images")?;
        let slugs: Vec<&str> = records.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["apple-pie", "zucchini-fritters"]);

        let fritters = &records[1];
        assert_eq!(fritters.name, "Zucchini Fritters");
        assert_eq!(fritters.description, "Crisp");
        assert_eq!(fritters.instructions, "1. Grate");
        assert_eq!(fritters.image_path, "recipe-images/zucchini-fritters.jpg");
        assert_eq!(fritters.tags, vec!["vegetarian".to_string()]);
        assert!(fritters.ingredients.contains("\"zucchini\""));

        assert_eq!(records[0].instructions, "1. Bake");
        assert_eq!(records[0].description, "");
        Ok(())
    }

    #[test]
    fn test_missing_dir_yields_no_records() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let records = load_recipe_dir(&dir.path().join("absent"), "b")?;
        assert!(records.is_empty());
        Ok(())
    }
}
