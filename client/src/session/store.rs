//! Session state container
//!
//! `SessionState` holds the single active session together with its
//! history, view selection and conversation. Every transition is a plain
//! method that mutates the state and returns the events it produced; the
//! caller publishes them. `SessionStore` is the shared handle the controller
//! and the poller both hold.
//!
//! # Fetch ordering
//!
//! Status fetches can complete out of order. Each fetch takes a
//! `FetchTicket` when it is issued, carrying the originating process id and a
//! store-wide increasing sequence number. A snapshot is applied only if its
//! ticket belongs to the active session and is newer than the last applied
//! one; anything else is discarded without touching state.

use super::history::{merge, History};
use super::view::{Panel, PanelAvailability, ViewSelector};
use crate::conversation::{notes, Conversation};
use crate::message_bus::{Event, ResetReason};
use sdk::errors::ClientError;
use sdk::types::{ResearchStatus, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// The active research session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub process_id: String,
    pub topic: String,
    pub requirements: String,
    /// Set once, after a successful confirm call
    pub confirmed: bool,
}

/// Issued when a status fetch starts, presented when its result is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    process_id: String,
    seq: u64,
}

impl FetchTicket {
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Why a snapshot was not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// No session is active
    Inactive,
    /// The ticket's process is no longer the active session
    Superseded,
    /// The response body names a different process than the one fetched
    ForeignBody { process_id: String },
    /// A newer fetch has already been applied
    Stale { seq: u64, last_applied: u64 },
}

/// Result of presenting a snapshot to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { status: ResearchStatus },
    Discarded(Discard),
}

impl ApplyOutcome {
    /// The terminal status that was applied, if any
    pub fn terminal_status(&self) -> Option<ResearchStatus> {
        match self {
            ApplyOutcome::Applied { status } if status.is_terminal() => Some(*status),
            _ => None,
        }
    }
}

/// Coarse session phase used for input routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session
    Idle,
    /// Session started, plan not confirmed yet
    AwaitingConfirmation,
    /// Confirmed and not terminal
    Running,
    /// Completed; kept around for its plan and report
    Finished,
}

/// Everything the client knows about the current research session
#[derive(Debug)]
pub struct SessionState {
    session: Option<Session>,
    history: History,
    view: ViewSelector,
    conversation: Conversation,
    /// Persistent failure from a server `error` status, kept until the next start
    failure: Option<String>,
    next_seq: u64,
    last_applied_seq: u64,
    plan_announced: bool,
    report_announced: bool,
}

impl SessionState {
    pub fn new(error_dismiss: Duration) -> Self {
        Self {
            session: None,
            history: History::default(),
            view: ViewSelector::new(),
            conversation: Conversation::new(error_dismiss),
            failure: None,
            next_seq: 0,
            last_applied_seq: 0,
            plan_announced: false,
            report_announced: false,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn process_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.process_id.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn view(&self) -> &ViewSelector {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewSelector {
        &mut self.view
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn availability(&self) -> PanelAvailability {
        PanelAvailability::new(&self.history, self.is_active())
    }

    pub fn current_panel(&self) -> Panel {
        self.view.current(self.availability())
    }

    pub fn navigate(&mut self, panel: Panel) -> Result<Panel, ClientError> {
        let availability = self.availability();
        self.view.navigate(panel, availability)
    }

    pub fn phase(&self) -> Phase {
        match &self.session {
            None => Phase::Idle,
            Some(_) if self.history.is_terminal() => Phase::Finished,
            Some(session) if !session.confirmed => Phase::AwaitingConfirmation,
            Some(_) => Phase::Running,
        }
    }

    /// Install a freshly started session, superseding any current one
    pub fn begin(
        &mut self,
        process_id: impl Into<String>,
        topic: impl Into<String>,
        requirements: impl Into<String>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(old) = self.session.take() {
            info!("Session {} superseded", old.process_id);
            events.push(Event::SessionReset {
                process_id: old.process_id,
                reason: ResetReason::Superseded,
            });
        }
        self.clear();
        self.failure = None;

        let session = Session {
            process_id: process_id.into(),
            topic: topic.into(),
            requirements: requirements.into(),
            confirmed: false,
        };
        info!("Session {} started", session.process_id);
        events.push(Event::SessionStarted {
            process_id: session.process_id.clone(),
        });
        self.session = Some(session);
        self.conversation.push_assistant(notes::PLANNING);
        events
    }

    /// Take a ticket for a status fetch of `process_id`.
    ///
    /// Returns `None` when that process is not the active session.
    pub fn issue_ticket(&mut self, process_id: &str) -> Option<FetchTicket> {
        if self.process_id() != Some(process_id) {
            return None;
        }
        self.next_seq += 1;
        Some(FetchTicket {
            process_id: process_id.to_string(),
            seq: self.next_seq,
        })
    }

    /// Merge a fetched snapshot if its ticket is still current
    pub fn apply(&mut self, ticket: &FetchTicket, snapshot: &Snapshot) -> (ApplyOutcome, Vec<Event>) {
        let Some(active) = self.process_id() else {
            debug!("Discarding snapshot for {}: no active session", ticket.process_id);
            return (ApplyOutcome::Discarded(Discard::Inactive), Vec::new());
        };

        if active != ticket.process_id {
            debug!(
                "Discarding snapshot for {}: active session is {}",
                ticket.process_id, active
            );
            return (ApplyOutcome::Discarded(Discard::Superseded), Vec::new());
        }

        if let Some(body_id) = snapshot
            .process_id
            .as_deref()
            .filter(|id| *id != ticket.process_id)
        {
            warn!(
                "Discarding snapshot for {}: response body names process {}",
                ticket.process_id, body_id
            );
            return (
                ApplyOutcome::Discarded(Discard::ForeignBody {
                    process_id: body_id.to_string(),
                }),
                Vec::new(),
            );
        }

        if ticket.seq <= self.last_applied_seq {
            debug!(
                "Discarding stale snapshot for {} (seq {} <= {})",
                ticket.process_id, ticket.seq, self.last_applied_seq
            );
            return (
                ApplyOutcome::Discarded(Discard::Stale {
                    seq: ticket.seq,
                    last_applied: self.last_applied_seq,
                }),
                Vec::new(),
            );
        }

        self.last_applied_seq = ticket.seq;
        self.history = merge(&self.history, snapshot);
        let process_id = ticket.process_id.clone();
        let status = snapshot.status;
        debug!(
            "Applied snapshot {} for {}: {} {}%",
            ticket.seq, process_id, status, snapshot.progress
        );

        let mut events = vec![Event::SnapshotApplied {
            process_id: process_id.clone(),
            status,
            progress: snapshot.progress,
        }];

        if !self.plan_announced && self.history.has_plan() {
            self.plan_announced = true;
            self.conversation.push_assistant(notes::PLAN_READY);
            events.push(Event::PlanReady {
                process_id: process_id.clone(),
            });
        }

        if let Some(panel) = self.view.observe(&self.history) {
            events.push(Event::PanelChanged { panel });
        }

        if status == ResearchStatus::Completed {
            if !self.report_announced && self.history.has_report() {
                self.report_announced = true;
                info!("Report ready for {}", process_id);
                self.conversation.push_assistant(notes::REPORT_READY);
                events.push(Event::ReportReady { process_id });
            } else if !self.history.has_report() {
                warn!("Session {} completed without a report", process_id);
            }
        } else if status.resets_session() {
            let reason = if status == ResearchStatus::Error {
                let message = notes::server_error(snapshot.error.as_deref());
                warn!("Session {} failed: {:?}", process_id, snapshot.error);
                self.conversation.push_assistant(message.clone());
                self.failure = Some(message);
                ResetReason::ServerError(snapshot.error.clone().unwrap_or_default())
            } else {
                info!("Session {} ended by the backend: {}", process_id, status);
                self.conversation.push_assistant(notes::SERVER_CANCELLED);
                ResetReason::ServerCancelled
            };
            self.session = None;
            self.clear();
            events.push(Event::SessionReset { process_id, reason });
        }

        (ApplyOutcome::Applied { status }, events)
    }

    /// Process id of a session that may be confirmed now
    pub fn confirmable(&self) -> Result<String, ClientError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ClientError::InvalidState("No active research session".to_string()))?;
        if session.confirmed {
            return Err(ClientError::InvalidState(format!(
                "Session {} is already confirmed",
                session.process_id
            )));
        }
        if self.history.is_terminal() {
            return Err(ClientError::InvalidState(format!(
                "Session {} has already finished",
                session.process_id
            )));
        }
        Ok(session.process_id.clone())
    }

    /// Record a successful confirm call for `process_id`
    pub fn mark_confirmed(&mut self, process_id: &str) -> Result<Vec<Event>, ClientError> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.process_id == process_id)
            .ok_or_else(|| {
                ClientError::InvalidState(format!(
                    "Session {} ended before the confirmation arrived",
                    process_id
                ))
            })?;
        if session.confirmed {
            return Ok(Vec::new());
        }
        session.confirmed = true;
        info!("Session {} confirmed", process_id);
        self.conversation.push_assistant(notes::CONFIRMED);
        Ok(vec![Event::Confirmed {
            process_id: process_id.to_string(),
        }])
    }

    /// Tear the session down at the user's request.
    ///
    /// Returns the cancelled process id with the events, or `None` when
    /// there was nothing to cancel.
    pub fn cancel(&mut self) -> Option<(String, Vec<Event>)> {
        let session = self.session.take()?;
        self.clear();
        self.conversation.push_assistant(notes::CANCELLED);
        info!("Session {} cancelled", session.process_id);
        let events = vec![Event::SessionReset {
            process_id: session.process_id.clone(),
            reason: ResetReason::UserCancelled,
        }];
        Some((session.process_id, events))
    }

    /// Synthesized answer for chat input while research is running
    pub fn progress_note(&self) -> String {
        notes::progress(self.history.progress, self.history.current_step.as_deref())
    }

    /// Reset history and per-session view state; the sequence counter keeps
    /// counting so tickets from an older session can never look newer
    fn clear(&mut self) {
        self.history = History::default();
        self.view.reset();
        self.plan_announced = false;
        self.report_announced = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

/// Shared handle to the session state
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().await
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}
