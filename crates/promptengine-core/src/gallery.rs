//! Knowledge gallery: fixed-interval document polling
//!
//! Every tick issues an independent GET. Responses are tagged with the
//! sequence number of the poll that produced them and `GalleryState` only
//! accepts responses newer than the last one it applied, so a slow early
//! response can never overwrite a later one. Each poller also carries the
//! generation it was started for; updates from any other poller are dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, DocumentList};
use crate::error::ApiError;
use crate::state::Document;

/// One poll result on its way back to the view
#[derive(Debug)]
pub struct GalleryUpdate {
    pub generation: u64,
    pub seq: u64,
    pub result: Result<DocumentList, ApiError>,
}

#[derive(Debug, Default)]
pub struct GalleryState {
    pub documents: Vec<Document>,
    pub total: Option<u64>,
    /// Visible error from the latest poll; the stale list stays on screen
    pub error: Option<String>,
    generation: u64,
    last_applied: Option<u64>,
}

impl GalleryState {
    /// Open a new polling generation. The current list stays on screen until
    /// the new poller's first response arrives.
    pub fn restart(&mut self) -> u64 {
        self.generation += 1;
        self.last_applied = None;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply a poll result. Returns false when it was discarded as out of date.
    pub fn apply(&mut self, update: GalleryUpdate) -> bool {
        if update.generation != self.generation {
            tracing::debug!(
                generation = update.generation,
                current = self.generation,
                "Discarding gallery response from a stopped poller"
            );
            return false;
        }
        if self.last_applied.is_some_and(|last| update.seq <= last) {
            tracing::debug!(seq = update.seq, "Discarding stale gallery response");
            return false;
        }
        self.last_applied = Some(update.seq);

        match update.result {
            Ok(list) => {
                self.documents = list.documents;
                self.total = list.count;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch documents: {}", e);
                self.error = Some(e.user_message());
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Running poll loop. Dropping the handle stops it.
pub struct GalleryPoller {
    task: JoinHandle<()>,
}

impl GalleryPoller {
    /// Poll immediately, then every `interval`, sending each result to `sink`
    pub fn spawn(
        client: ApiClient,
        interval: Duration,
        generation: u64,
        sink: mpsc::UnboundedSender<GalleryUpdate>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut seq: u64 = 0;
            let mut ticker = tokio::time::interval(interval);
            // Late ticks are delayed, never fired in a burst
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    break;
                }

                seq += 1;
                let client = client.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    let result = client.list_documents(None).await;
                    let _ = sink.send(GalleryUpdate {
                        generation,
                        seq,
                        result,
                    });
                });
            }
        });

        Self { task }
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for GalleryPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
