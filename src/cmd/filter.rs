//! Feed filter URL command: `recipe-feed filter`.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use recipe_feed::config::Config;
use recipe_feed::sync::{FeedFilters, Navigation, SyncDriver, SyncEvent};

/// Drive the URL synchronizer with the requested edits and print every
/// navigation it issues, followed by the resulting URL.
pub async fn cmd_filter(
    config: &Config,
    url: &str,
    toggle: &[String],
    remove: &[String],
    clear: bool,
    search: Option<&str>,
) -> Result<()> {
    let timing = config.sync_timing;
    let filters = FeedFilters::from_url(url, timing);

    let mut events: Vec<SyncEvent> = Vec::new();
    if clear {
        events.push(SyncEvent::ClearTags);
    }
    events.extend(remove.iter().cloned().map(SyncEvent::RemoveTag));
    events.extend(toggle.iter().cloned().map(SyncEvent::ToggleTag));
    if let Some(text) = search {
        events.push(SyncEvent::Input(text.to_string()));
    }

    let (nav_tx, mut nav_rx) = mpsc::channel(events.len() + 1);
    let driver = SyncDriver::spawn(filters, nav_tx);
    for event in events {
        driver.send(event).await.context("Sync driver stopped early")?;
    }
    let mut issued = Vec::new();
    if search.is_some() {
        // The search write is debounced; wait for it before stopping.
        let wait = timing.debounce * 2 + Duration::from_millis(100);
        let _ = tokio::time::timeout(wait, async {
            while let Some(navigation) = nav_rx.recv().await {
                let done = matches!(navigation, Navigation::Replace(_));
                issued.push(navigation);
                if done {
                    break;
                }
            }
        })
        .await;
    }
    let filters = driver.shutdown().await.context("Sync driver failed")?;
    while let Some(navigation) = nav_rx.recv().await {
        issued.push(navigation);
    }

    for navigation in &issued {
        let kind = match navigation {
            Navigation::Push(_) => "push",
            Navigation::Replace(_) => "replace",
        };
        println!("{:<8} {}", kind, navigation.url());
    }

    tracing::debug!(tags = ?filters.active_tags(), q = filters.search_query(), "Final filters");
    let final_url = issued.last().map_or(url, |navigation| navigation.url());
    println!("{}", final_url);
    Ok(())
}
