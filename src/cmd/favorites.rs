//! Favorites command: `recipe-feed favorite`.

use anyhow::Result;

use recipe_feed::config::Config;
use recipe_feed::favorites::Favorites;

pub fn cmd_favorite(config: &Config, slug: Option<&str>) -> Result<()> {
    let favorites = Favorites::new(config.favorites_path());

    let Some(slug) = slug else {
        let all = favorites.all();
        if all.is_empty() {
            println!("No favorites yet.");
        }
        for slug in all {
            println!("{}", slug);
        }
        return Ok(());
    };

    if favorites.toggle(slug)? {
        println!("Added {} to favorites", slug);
    } else {
        println!("Removed {} from favorites", slug);
    }
    Ok(())
}
