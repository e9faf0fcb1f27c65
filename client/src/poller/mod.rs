//! Status poller
//!
//! The poller periodically fetches the status of the active research session
//! and feeds each snapshot through the session store. It:
//! - Fetches immediately on start, then once per configured interval
//! - Stops by itself on a terminal status or when the session it serves is
//!   no longer active; a response naming some other process is dropped and
//!   polling carries on
//! - Keeps ticking through failed fetches, unless a consecutive failure
//!   limit is configured
//!
//! `spawn` returns a `PollHandle`. Stopping the handle is idempotent, and
//! teardown runs exactly once whichever of {terminal status, explicit stop,
//! handle dropped} gets there first.
//!
//! # Examples
//!
//! ```no_run
//! use deepresearch_client::api::{HttpResearchApi, ResearchApi};
//! use deepresearch_client::config::Config;
//! use deepresearch_client::message_bus::MessageBus;
//! use deepresearch_client::poller::{self, PollerConfig};
//! use deepresearch_client::session::SessionStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! let api: Arc<dyn ResearchApi> = Arc::new(HttpResearchApi::new(&config.api)?);
//! let store = SessionStore::default();
//! let bus = Arc::new(MessageBus::new());
//!
//! store.lock().await.begin("1712", "topic", "requirements");
//! let handle = poller::spawn(api, store, bus, PollerConfig::from(&config.polling), "1712");
//!
//! // Later, e.g. on cancel
//! handle.stop();
//! # Ok(())
//! # }
//! ```

use crate::api::ResearchApi;
use crate::config::PollingConfig;
use crate::message_bus::{Event, MessageBus, StopReason};
use crate::session::{ApplyOutcome, Discard, SessionStore};
use sdk::errors::TransportError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Poller settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between fetches
    pub interval: Duration,

    /// Stop after this many consecutive failed fetches; `None` never stops
    pub max_consecutive_failures: Option<u32>,
}

impl From<&PollingConfig> for PollerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Handle to a running poll loop
#[derive(Debug)]
pub struct PollHandle {
    process_id: String,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    /// Stop polling.
    ///
    /// Returns `true` if this call performed the teardown, `false` if the
    /// poller had already stopped. A fetch already in flight is abandoned.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.task.abort();
        tracing::info!("Polling stopped for {}", self.process_id);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start polling `process_id`
pub fn spawn(
    api: Arc<dyn ResearchApi>,
    store: SessionStore,
    bus: Arc<MessageBus>,
    config: PollerConfig,
    process_id: impl Into<String>,
) -> PollHandle {
    let process_id = process_id.into();
    let stopped = Arc::new(AtomicBool::new(false));

    tracing::info!(
        "Polling {} every {:?} (failure limit: {:?})",
        process_id,
        config.interval,
        config.max_consecutive_failures
    );

    let task = tokio::spawn(run(
        api,
        store,
        bus,
        config,
        process_id.clone(),
        Arc::clone(&stopped),
    ));

    PollHandle {
        process_id,
        stopped,
        task,
    }
}

async fn run(
    api: Arc<dyn ResearchApi>,
    store: SessionStore,
    bus: Arc<MessageBus>,
    config: PollerConfig,
    process_id: String,
    stopped: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    let reason = loop {
        ticker.tick().await;
        if stopped.load(Ordering::SeqCst) {
            return;
        }

        match fetch_and_apply(api.as_ref(), &store, &bus, &process_id).await {
            Ok(outcome) => {
                failures = 0;
                if let Some(status) = outcome.terminal_status() {
                    break StopReason::Terminal(status);
                }
                match outcome {
                    ApplyOutcome::Discarded(Discard::Inactive | Discard::Superseded) => {
                        break StopReason::SessionGone;
                    }
                    ApplyOutcome::Discarded(Discard::ForeignBody { process_id: other }) => {
                        tracing::debug!(
                            "Ignoring status for {} returned while polling {}",
                            other,
                            process_id
                        );
                    }
                    _ => {}
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    "Status fetch for {} failed ({} in a row): {}",
                    process_id,
                    failures,
                    e
                );
                bus.publish(Event::PollFailed {
                    process_id: process_id.clone(),
                    error: e.to_string(),
                    consecutive: failures,
                })
                .await;

                if config.max_consecutive_failures.is_some_and(|max| failures >= max) {
                    break StopReason::TooManyFailures(failures);
                }
            }
        }
    };

    if stopped.swap(true, Ordering::SeqCst) {
        return;
    }
    tracing::info!("Polling stopped for {}: {:?}", process_id, reason);
    bus.publish(Event::PollingStopped { process_id, reason }).await;
}

/// Fetch one snapshot for `process_id` and present it to the store.
///
/// The fetch takes its ticket before the request is sent, so a response that
/// is overtaken by a later fetch is discarded rather than applied. When
/// `process_id` is not the active session no request is made and the outcome
/// is `Discarded(Inactive)`.
pub async fn fetch_and_apply(
    api: &dyn ResearchApi,
    store: &SessionStore,
    bus: &MessageBus,
    process_id: &str,
) -> Result<ApplyOutcome, TransportError> {
    let Some(ticket) = store.lock().await.issue_ticket(process_id) else {
        tracing::debug!("Skipping status fetch for inactive session {}", process_id);
        return Ok(ApplyOutcome::Discarded(Discard::Inactive));
    };

    tracing::debug!("Fetching status for {} (seq {})", process_id, ticket.seq());
    let snapshot = api.status(process_id).await?;

    let (outcome, events) = store.lock().await.apply(&ticket, &snapshot);
    bus.publish_all(events).await;
    Ok(outcome)
}
