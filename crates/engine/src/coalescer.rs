//! Generation cache with in-flight coalescing.
//!
//! Synthesis is the expensive operation in the system, so results are cached
//! per [`GenerationKey`] and concurrent requests for the same key share a
//! single model call: one leader generates, everyone else subscribes to the
//! outcome. Entries carry the source-data version they were built from;
//! a cached document is served only while storage still reports that
//! version. Failures are broadcast to every waiter and never cached.

use std::collections::HashMap;

use aftercare_core::error::{Error, Result};
use aftercare_core::instructions::{GenerationKey, PersonalizedInstructions};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

enum Slot {
    /// A generation for this key is running; subscribe for its outcome.
    InFlight(broadcast::Sender<Result<PersonalizedInstructions>>),
    Ready {
        instructions: PersonalizedInstructions,
        source_version: DateTime<Utc>,
    },
}

/// Per-key cache of synthesized documents with single-flight generation.
#[derive(Default)]
pub struct GenerationCache {
    slots: Mutex<HashMap<GenerationKey, Slot>>,
}

impl GenerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached document for `key` if it is still current, join an
    /// in-flight generation if one exists, or run `generate` as the leader.
    ///
    /// `current_version` is the version stamp of the clinical data as of
    /// this request; a cached entry built from older data is regenerated.
    pub async fn get_or_generate<F, Fut>(
        &self,
        key: &GenerationKey,
        current_version: DateTime<Utc>,
        generate: F,
    ) -> Result<PersonalizedInstructions>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PersonalizedInstructions>>,
    {
        let tx = {
            let mut slots = self.slots.lock().await;
            match slots.get(key) {
                Some(Slot::Ready {
                    instructions,
                    source_version,
                }) if *source_version >= current_version => {
                    debug!(%key, "Generation cache hit");
                    return Ok(instructions.clone());
                }
                Some(Slot::Ready { .. }) => {
                    debug!(%key, "Cached document is stale, regenerating");
                }
                Some(Slot::InFlight(tx)) => {
                    debug!(%key, "Joining in-flight generation");
                    let mut rx = tx.subscribe();
                    drop(slots);
                    return match rx.recv().await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(Error::Internal(
                            "coalesced generation ended without a result".into(),
                        )),
                    };
                }
                None => {}
            }
            let (tx, _rx) = broadcast::channel(1);
            slots.insert(key.clone(), Slot::InFlight(tx.clone()));
            tx
        };

        debug!(%key, "Leading generation");
        let outcome = generate().await;

        {
            let mut slots = self.slots.lock().await;
            match &outcome {
                Ok(instructions) => {
                    slots.insert(
                        key.clone(),
                        Slot::Ready {
                            instructions: instructions.clone(),
                            source_version: current_version,
                        },
                    );
                }
                // A failed generation leaves nothing behind: the next
                // request retries from scratch.
                Err(_) => {
                    slots.remove(key);
                }
            }
        }

        // No receivers is fine: every waiter may have been cancelled.
        let _ = tx.send(outcome.clone());
        outcome
    }

    /// Drop any cached or completed entry for `key`. An in-flight
    /// generation is left to finish; its waiters still get their result.
    pub async fn invalidate(&self, key: &GenerationKey) {
        let mut slots = self.slots.lock().await;
        if let Some(Slot::Ready { .. }) = slots.get(key) {
            slots.remove(key);
            debug!(%key, "Invalidated cached document");
        }
    }

    /// Number of keys currently cached or in flight.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
