//! Message Bus for client notifications
//!
//! The MessageBus lets the session state machine announce what happened
//! (plan ready, report ready, session torn down, poll failures) without
//! knowing who renders it. Front ends subscribe to the event types they
//! care about, or to `EventType::All`.
//!
//! Channels are bounded. Publishing never waits: if a subscriber's channel is
//! full or closed the event is dropped for that subscriber, so a slow front
//! end can never stall the poller.

use sdk::types::ResearchStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::session::Panel;

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the message bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    /// A research session was started
    SessionStarted,
    /// A status snapshot was merged into history
    SnapshotApplied,
    /// The plan became available for confirmation
    PlanReady,
    /// The plan was confirmed
    Confirmed,
    /// The final report became available
    ReportReady,
    /// The session and its history were cleared
    SessionReset,
    /// A status fetch failed
    PollFailed,
    /// The poller stopped for good
    PollingStopped,
    /// The view selector switched panels on its own
    PanelChanged,
    /// Subscribe to all event types
    All,
}

/// Why a session was torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// The user cancelled locally
    UserCancelled,
    /// The backend reported an `error` status
    ServerError(String),
    /// The backend reported a `cancelled` status
    ServerCancelled,
    /// A new session replaced this one
    Superseded,
}

/// Why the poller stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A terminal status was observed
    Terminal(ResearchStatus),
    /// Too many consecutive fetch failures
    TooManyFailures(u32),
    /// The session it served is no longer active
    SessionGone,
}

/// Events that can be published on the message bus
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Session started with its backend process ID
    SessionStarted { process_id: String },
    /// Snapshot merged with resulting status and progress
    SnapshotApplied {
        process_id: String,
        status: ResearchStatus,
        progress: u32,
    },
    /// Plan available for the user to confirm
    PlanReady { process_id: String },
    /// Plan confirmed
    Confirmed { process_id: String },
    /// Report available
    ReportReady { process_id: String },
    /// Session cleared
    SessionReset {
        process_id: String,
        reason: ResetReason,
    },
    /// Status fetch failed
    PollFailed {
        process_id: String,
        error: String,
        consecutive: u32,
    },
    /// Poller stopped
    PollingStopped {
        process_id: String,
        reason: StopReason,
    },
    /// Auto-navigation selected a panel
    PanelChanged { panel: Panel },
}

impl Event {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::SessionStarted { .. } => EventType::SessionStarted,
            Event::SnapshotApplied { .. } => EventType::SnapshotApplied,
            Event::PlanReady { .. } => EventType::PlanReady,
            Event::Confirmed { .. } => EventType::Confirmed,
            Event::ReportReady { .. } => EventType::ReportReady,
            Event::SessionReset { .. } => EventType::SessionReset,
            Event::PollFailed { .. } => EventType::PollFailed,
            Event::PollingStopped { .. } => EventType::PollingStopped,
            Event::PanelChanged { .. } => EventType::PanelChanged,
        }
    }
}

/// Message bus for pub/sub communication between components
pub struct MessageBus {
    /// Map of event types to lists of subscribers
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<Event>>>>>,
}

impl MessageBus {
    /// Create a new MessageBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type, or `EventType::All`
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to all subscribers
    ///
    /// The event is sent to subscribers of its specific type as well as all
    /// subscribers of `EventType::All`. Closed subscribers are pruned.
    pub async fn publish(&self, event: Event) {
        let mut channels = self.channels.lock().await;
        let event_type = event.event_type();

        for key in [event_type, EventType::All] {
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Dropping {:?} for a lagging subscriber", event_type);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }
    }

    /// Publish several events in order
    pub async fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.publish(event).await;
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
