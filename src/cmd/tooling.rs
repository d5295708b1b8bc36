//! Offline data tooling: `recipe-feed seed-sql`, `upload-images`,
//! `shuffle-seed`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use recipe_feed::backend::SupabaseClient;
use recipe_feed::backend::storage::hash_file;
use recipe_feed::config::Config;
use recipe_feed::seed::{build_seed_sql, load_recipe_dir};
use recipe_feed::shuffle::{date_seed, today_seed};

pub fn cmd_seed_sql(config: &Config, dir: &Path, output: &Path) -> Result<()> {
    let records = load_recipe_dir(dir, &config.backend.storage_bucket)?;
    if records.is_empty() {
        bail!("No recipe documents found under {}", dir.display());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, build_seed_sql(&records))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Updated {} with {} records.", output.display(), records.len());
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResult {
    slug: String,
    bucket: String,
    path: String,
    public_url: String,
    hash: String,
}

pub async fn cmd_upload_images(config: &Config, dir: &Path, manifest_path: &Path) -> Result<()> {
    let Some(client) = SupabaseClient::from_settings(&config.backend) else {
        bail!("Set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY before uploading images");
    };
    let bucket = client.bucket().to_string();
    client.ensure_bucket(&bucket).await?;

    let mut slugs: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    slugs.sort();

    let mut manifest = Vec::new();
    for slug in slugs {
        let image = dir.join(&slug).join(format!("{}.jpg", slug));
        if !image.is_file() {
            tracing::warn!("Skipping {}; image not found at {}", slug, image.display());
            continue;
        }

        let bytes = std::fs::read(&image)
            .with_context(|| format!("Failed to read {}", image.display()))?;
        let hash = hash_file(&image)
            .with_context(|| format!("Failed to hash {}", image.display()))?;
        let remote_path = format!("{}.jpg", slug);
        let public_url = client.upload_object(&bucket, &remote_path, bytes).await?;

        println!("Uploaded {} → {}/{}", slug, bucket, remote_path);
        manifest.push(UploadResult {
            slug,
            bucket: bucket.clone(),
            path: remote_path,
            public_url,
            hash,
        });
    }

    if manifest.is_empty() {
        println!("No recipes uploaded.");
        return Ok(());
    }

    let encoded = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(manifest_path, format!("{}\n", encoded))
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;
    println!("\nSaved manifest: {}", manifest_path.display());
    Ok(())
}

pub fn cmd_shuffle_seed(date: Option<&str>) -> Result<()> {
    let seed = match date {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?;
            date_seed(date)
        }
        None => today_seed(),
    };
    println!("{}", seed);
    Ok(())
}
