//! An ordered chain of venue adapters with health-weighted reordering.
//!
//! [`FallbackChain::fetch_with_fallback`] walks the chain in order, returning
//! the first successful result annotated with the venue that served it.
//! [`FallbackChain::reorder`] is pure data — it only changes which venue is
//! tried first next time, it never itself issues a call.
//!
//! # Example
//!
//! ```no_run
//! use market_facade_fallback::{FallbackChain, ScoreInputs};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(chain: FallbackChain, adapters: Vec<std::sync::Arc<dyn market_facade_fallback::VenueAdapter>>) -> Result<(), Box<dyn std::error::Error>> {
//! for adapter in adapters {
//!     chain.push(adapter);
//! }
//! chain.reorder();
//!
//! let ctx = CancellationToken::new();
//! let result = chain
//!     .fetch_with_fallback(ctx, |adapter, ctx| async move {
//!         adapter.get_trades(ctx, &"BTC-USD".parse()?, 50).await
//!     })
//!     .await?;
//! println!("served by {}", result.served_by);
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod score;

pub use error::{AggregateFailure, FallbackError};
pub use events::FallbackEvent;
pub use market_facade_registry::{AdapterError, VenueAdapter};
pub use score::{ScoreInputs, ScoreWeights};

use market_facade_core::EventListeners;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

struct ChainEntry {
    adapter: Arc<dyn VenueAdapter>,
    score: ScoreInputs,
}

/// The value an operation produced, annotated with the venue that served it.
#[derive(Debug, Clone)]
pub struct FallbackResult<T> {
    pub value: T,
    pub served_by: String,
}

/// An ordered list of venue adapters, tried in sequence until one succeeds.
pub struct FallbackChain {
    name: String,
    weights: ScoreWeights,
    entries: Mutex<Vec<ChainEntry>>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl FallbackChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_weights(name, ScoreWeights::default())
    }

    pub fn with_weights(name: impl Into<String>, weights: ScoreWeights) -> Self {
        Self {
            name: name.into(),
            weights,
            entries: Mutex::new(Vec::new()),
            event_listeners: EventListeners::new(),
        }
    }

    /// Registers a listener for chain events (served / attempt-failed / all-failed / reordered).
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: market_facade_core::EventListener<FallbackEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Appends a venue to the end of the chain's current order.
    pub fn push(&self, adapter: Arc<dyn VenueAdapter>) {
        self.entries
            .lock()
            .expect("chain lock poisoned")
            .push(ChainEntry { adapter, score: ScoreInputs::default() });
    }

    /// Venue names in current attempt order.
    pub fn venues(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("chain lock poisoned")
            .iter()
            .map(|e| e.adapter.venue().to_string())
            .collect()
    }

    /// Updates the scoring inputs used for `venue` on the next [`Self::reorder`].
    /// No-op if `venue` isn't in the chain.
    pub fn update_score(&self, venue: &str, inputs: ScoreInputs) {
        let mut entries = self.entries.lock().expect("chain lock poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.adapter.venue() == venue) {
            entry.score = inputs;
        }
    }

    /// Recomputes each venue's score and stable-sorts the chain by
    /// descending score. Pure data — issues no calls.
    pub fn reorder(&self) {
        let mut entries = self.entries.lock().expect("chain lock poisoned");
        entries.sort_by(|a, b| {
            let score_a = self.weights.score(&a.score);
            let score_b = self.weights.score(&b.score);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        drop(entries);
        self.event_listeners.emit(&FallbackEvent::Reordered {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
        });
    }

    /// `true` if at least one venue in the chain is currently marked healthy.
    pub fn healthy(&self) -> bool {
        self.entries.lock().expect("chain lock poisoned").iter().any(|e| e.score.healthy)
    }

    /// Fraction of venues in the chain currently marked healthy, in `[0, 1]`.
    /// `0.0` for an empty chain.
    pub fn health_ratio(&self) -> f64 {
        let entries = self.entries.lock().expect("chain lock poisoned");
        if entries.is_empty() {
            return 0.0;
        }
        let healthy_count = entries.iter().filter(|e| e.score.healthy).count();
        healthy_count as f64 / entries.len() as f64
    }

    /// Tries `op` against each venue in order, returning the first success.
    /// On total failure, returns an [`AggregateFailure`] carrying one
    /// diagnostic per venue attempted, in order. Never short-circuits the
    /// attempt loop on an individual failure — every venue gets a try unless
    /// `op` succeeds or `ctx` is cancelled first.
    pub async fn fetch_with_fallback<T, F, Fut>(
        &self,
        ctx: CancellationToken,
        op: F,
    ) -> Result<FallbackResult<T>, FallbackError>
    where
        F: Fn(Arc<dyn VenueAdapter>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let snapshot: Vec<Arc<dyn VenueAdapter>> = {
            let entries = self.entries.lock().expect("chain lock poisoned");
            entries.iter().map(|e| Arc::clone(&e.adapter)).collect()
        };

        if snapshot.is_empty() {
            return Err(FallbackError::EmptyChain);
        }

        let mut attempts = Vec::with_capacity(snapshot.len());
        for (index, adapter) in snapshot.into_iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }

            let venue = adapter.venue().to_string();
            match op(Arc::clone(&adapter), ctx.clone()).await {
                Ok(value) => {
                    self.event_listeners.emit(&FallbackEvent::Served {
                        pattern_name: self.name.clone(),
                        venue: venue.clone(),
                        attempt_index: index,
                        timestamp: Instant::now(),
                    });
                    return Ok(FallbackResult { value, served_by: venue });
                }
                Err(err) => {
                    self.event_listeners.emit(&FallbackEvent::AttemptFailed {
                        pattern_name: self.name.clone(),
                        venue: venue.clone(),
                        timestamp: Instant::now(),
                    });
                    attempts.push((venue, err));
                }
            }
        }

        self.event_listeners.emit(&FallbackEvent::AllFailed {
            pattern_name: self.name.clone(),
            attempted: attempts.len(),
            timestamp: Instant::now(),
        });
        Err(FallbackError::AllFailed(AggregateFailure { attempts }))
    }
}
