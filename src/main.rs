use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use recipe_feed::config::Config;
use recipe_feed::gemini::GenerateOptions;

mod cmd;

#[derive(Parser)]
#[command(name = "recipe-feed")]
#[command(version, about = "Cached recipe feed, API server and recipe tooling")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Review a recipe YAML document with Gemini
    Evaluate {
        /// Path to the recipe YAML
        recipe: PathBuf,

        /// Write the normalized document back before evaluating
        #[arg(long)]
        fix: bool,
    },
    /// Generate a new recipe with Gemini
    Generate {
        /// Recipe title
        title: String,

        /// Short description of the dish
        #[arg(short, long)]
        description: String,

        /// Allowed tag (repeatable, at least one)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Extra notes for the model
        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        servings: Option<u32>,

        #[arg(long)]
        cuisine: Option<String>,

        /// Save as a recipe document under this directory instead of printing
        #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "data/recipes")]
        save: Option<PathBuf>,
    },
    /// Write the upsert script for every recipe document
    SeedSql {
        #[arg(long, default_value = "data/recipes")]
        dir: PathBuf,

        #[arg(short, long, default_value = "supabase/seed.sql")]
        output: PathBuf,
    },
    /// Delete a recipe through the API using EDIT_TOKEN
    Delete { slug: String },
    /// Upload recipe images to object storage and write a manifest
    UploadImages {
        #[arg(long, default_value = "data/recipes")]
        dir: PathBuf,

        #[arg(long, default_value = "data/recipe-storage-manifest.json")]
        manifest: PathBuf,
    },
    /// Print the feed shuffle seed for a date (defaults to today)
    ShuffleSeed {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// List the feed, reading through the local cache
    Feed {
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,

        /// Show only what is cached, without touching the network
        #[arg(long)]
        offline: bool,

        /// Order the feed with today's shuffle
        #[arg(long)]
        shuffle: bool,
    },
    /// Show one recipe, reading through the local cache
    Show {
        /// Recipe slug (or a name, which is slugified)
        slug: String,

        /// Print the structured recipe as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pick a random recipe
    Random {
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Toggle a favorite, or list favorites when no slug is given
    Favorite { slug: Option<String> },
    /// Apply tag and search changes to a feed URL
    Filter {
        /// Current feed URL
        #[arg(long, default_value = "/feed")]
        url: String,

        /// Toggle a tag (repeatable)
        #[arg(long = "toggle")]
        toggle: Vec<String>,

        /// Remove a tag (repeatable)
        #[arg(long = "remove")]
        remove: Vec<String>,

        /// Clear every tag
        #[arg(long)]
        clear: bool,

        /// Replace the search text
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    recipe_feed::logging::init(cli.verbose);

    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    Config::load_env_files(&project_dir);
    let config = Config::from_env(cli.verbose)?;

    match &cli.command {
        Commands::Serve { port, dev } => cmd::cmd_serve(&config, *port, *dev).await?,
        Commands::Evaluate { recipe, fix } => cmd::cmd_evaluate(&config, recipe, *fix).await?,
        Commands::Generate {
            title,
            description,
            tags,
            comment,
            servings,
            cuisine,
            save,
        } => {
            let options = GenerateOptions {
                title: title.clone(),
                description: description.clone(),
                tags: tags.clone(),
                user_comment: comment.clone(),
                servings: *servings,
                cuisine: cuisine.clone(),
            };
            cmd::cmd_generate(&config, options, save.as_deref()).await?
        }
        Commands::SeedSql { dir, output } => cmd::cmd_seed_sql(&config, dir, output)?,
        Commands::Delete { slug } => cmd::cmd_delete(&config, slug).await?,
        Commands::UploadImages { dir, manifest } => {
            cmd::cmd_upload_images(&config, dir, manifest).await?
        }
        Commands::ShuffleSeed { date } => cmd::cmd_shuffle_seed(date.as_deref())?,
        Commands::Feed {
            pages,
            offline,
            shuffle,
        } => cmd::cmd_feed(&config, *pages, *offline, *shuffle).await?,
        Commands::Show { slug, json } => cmd::cmd_show(&config, slug, *json).await?,
        Commands::Random { exclude } => cmd::cmd_random(&config, exclude.as_deref()).await?,
        Commands::Favorite { slug } => cmd::cmd_favorite(&config, slug.as_deref())?,
        Commands::Filter {
            url,
            toggle,
            remove,
            clear,
            search,
        } => cmd::cmd_filter(&config, url, toggle, remove, *clear, search.as_deref()).await?,
    }

    Ok(())
}
