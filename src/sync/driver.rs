use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{FeedFilters, Navigation};

/// Input to a running [`SyncDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Input(String),
    ToggleTag(String),
    RemoveTag(String),
    ClearTags,
    UrlChanged(String),
}

/// Runs [`FeedFilters`] on a tokio task, turning events and elapsed timers
/// into [`Navigation`] commands.
pub struct SyncDriver {
    events: mpsc::Sender<SyncEvent>,
    handle: JoinHandle<FeedFilters>,
}

impl SyncDriver {
    pub fn spawn(filters: FeedFilters, navigations: mpsc::Sender<Navigation>) -> Self {
        let (events, rx) = mpsc::channel(64);
        let handle = tokio::spawn(run(filters, rx, navigations));
        Self { events, handle }
    }

    pub async fn send(&self, event: SyncEvent) -> Result<(), mpsc::error::SendError<SyncEvent>> {
        self.events.send(event).await
    }

    /// Stop the driver and return the final filter state.
    pub async fn shutdown(self) -> Result<FeedFilters, tokio::task::JoinError> {
        drop(self.events);
        self.handle.await
    }
}

async fn run(
    mut filters: FeedFilters,
    mut events: mpsc::Receiver<SyncEvent>,
    navigations: mpsc::Sender<Navigation>,
) -> FeedFilters {
    let epoch = Instant::now();
    let elapsed = || Instant::now().duration_since(epoch);

    loop {
        let deadline = filters.next_deadline();
        let wake_at = epoch + deadline.unwrap_or(Duration::ZERO);

        let navigation = tokio::select! {
            event = events.recv() => match event {
                Some(SyncEvent::Input(text)) => {
                    filters.type_query(text, elapsed());
                    None
                }
                Some(SyncEvent::ToggleTag(tag)) => Some(filters.toggle_tag(&tag)),
                Some(SyncEvent::RemoveTag(tag)) => Some(filters.remove_tag(&tag)),
                Some(SyncEvent::ClearTags) => Some(filters.clear_tags()),
                Some(SyncEvent::UrlChanged(url)) => {
                    filters.on_url_change(&url, elapsed());
                    None
                }
                None => break,
            },
            _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                filters.poll(elapsed())
            }
        };

        if let Some(navigation) = navigation
            && navigations.send(navigation).await.is_err()
        {
            tracing::debug!("Navigation receiver dropped, stopping sync driver");
            break;
        }
    }

    filters
}
