//! Session Controller
//!
//! Owns the research session lifecycle and routes user text:
//!
//! 1. Session awaiting confirmation: answer with a reminder to confirm or cancel
//! 2. Session confirmed and still running: answer with a progress summary
//! 3. Research request: start a new session
//! 4. Anything else: ordinary chat
//!
//! Transport errors never escape as panics or unhandled failures. Every
//! user-facing operation records them on the conversation's transient error
//! banner and returns them to the caller; `start` and `confirm` leave the
//! session exactly as it was before the call.

use sdk::errors::{ClientError, TransportError};
use sdk::types::{ChatRequest, StartRequest};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::ResearchApi;
use crate::config::Config;
use crate::conversation::notes;
use crate::message_bus::MessageBus;
use crate::poller::{self, PollHandle, PollerConfig};
use crate::session::{ApplyOutcome, Panel, Phase, SessionState, SessionStore};

pub mod intent;

pub use intent::{split_topic, Intent, IntentClassifier, KeywordClassifier};

/// What `handle_input` did with a line of user text
#[derive(Debug)]
pub enum InputOutcome {
    /// Blank input
    Ignored,
    /// Reminded the user to confirm or cancel the pending plan
    Reminded,
    /// Answered with a progress summary of the running session
    ProgressReported,
    /// Started a research session
    ResearchStarted { process_id: String },
    /// Answered through ordinary chat
    Answered,
    /// The request failed; the failure is already in the conversation
    Failed(ClientError),
}

/// Drives one research session at a time
pub struct SessionController {
    api: Arc<dyn ResearchApi>,
    store: SessionStore,
    bus: Arc<MessageBus>,
    classifier: Arc<dyn IntentClassifier>,
    poller_config: PollerConfig,
    default_requirements: String,
    poll_handle: Mutex<Option<PollHandle>>,
}

impl SessionController {
    /// Create a controller with the keyword classifier from `config`
    pub fn new(api: Arc<dyn ResearchApi>, bus: Arc<MessageBus>, config: &Config) -> Self {
        Self {
            api,
            store: SessionStore::new(SessionState::new(config.chat.error_dismiss())),
            bus,
            classifier: Arc::new(KeywordClassifier::from_config(&config.intent)),
            poller_config: PollerConfig::from(&config.polling),
            default_requirements: config.chat.default_requirements.clone(),
            poll_handle: Mutex::new(None),
        }
    }

    /// Replace the intent classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn classify_intent(&self, text: &str) -> Intent {
        self.classifier.classify(text)
    }

    /// Start a research session, superseding any current one.
    ///
    /// On failure nothing changes apart from the error banner.
    pub async fn start(&self, topic: &str, requirements: &str) -> Result<String, ClientError> {
        let request = StartRequest {
            topic: topic.to_string(),
            requirements: requirements.to_string(),
        };
        info!("Starting research on '{}'", topic);

        let response = match self.api.start(&request).await {
            Ok(response) if !response.process_id.trim().is_empty() => response,
            Ok(_) => {
                let e = ClientError::from(TransportError::MalformedResponse(
                    "start response carried an empty process_id".to_string(),
                ));
                return Err(self.surface(e).await);
            }
            Err(e) => {
                error!("Failed to start research: {}", e);
                return Err(self.surface(e.into()).await);
            }
        };
        let process_id = response.process_id;

        let mut poll_handle = self.poll_handle.lock().await;
        if let Some(old) = poll_handle.take() {
            old.stop();
        }

        let events = self
            .store
            .lock()
            .await
            .begin(&process_id, topic, requirements);
        self.bus.publish_all(events).await;

        *poll_handle = Some(poller::spawn(
            Arc::clone(&self.api),
            self.store.clone(),
            Arc::clone(&self.bus),
            self.poller_config,
            &process_id,
        ));

        Ok(process_id)
    }

    /// Confirm the pending plan.
    ///
    /// Fails with `InvalidState` without any network call when there is no
    /// session awaiting confirmation. On success the status is refreshed
    /// right away instead of waiting for the next poll.
    pub async fn confirm(&self) -> Result<(), ClientError> {
        let process_id = self.store.lock().await.confirmable()?;
        info!("Confirming plan for {}", process_id);

        if let Err(e) = self.api.confirm(&process_id).await {
            warn!("Confirm failed for {}: {}", process_id, e);
            return Err(self.surface(e.into()).await);
        }

        let events = self.store.lock().await.mark_confirmed(&process_id)?;
        self.bus.publish_all(events).await;

        match poller::fetch_and_apply(self.api.as_ref(), &self.store, &self.bus, &process_id).await
        {
            Ok(outcome) => self.stop_if_terminal(&outcome).await,
            Err(e) => warn!("Status refresh after confirm failed for {}: {}", process_id, e),
        }
        Ok(())
    }

    /// Cancel the current session.
    ///
    /// Polling stops and local state resets before the backend is told;
    /// a failed backend cancel is only logged. Returns the cancelled process
    /// id, or `None` if there was no session.
    pub async fn cancel(&self) -> Option<String> {
        self.stop_polling().await;

        let (process_id, events) = self.store.lock().await.cancel()?;
        self.bus.publish_all(events).await;

        match self.api.cancel(&process_id).await {
            Ok(_) => debug!("Backend acknowledged cancel of {}", process_id),
            Err(e) => warn!("Backend cancel of {} failed: {}", process_id, e),
        }
        Some(process_id)
    }

    /// Fetch the current session's status now
    pub async fn refresh(&self) -> Result<ApplyOutcome, ClientError> {
        let process_id = self
            .store
            .lock()
            .await
            .process_id()
            .map(String::from)
            .ok_or_else(|| ClientError::InvalidState("No active research session".to_string()))?;

        match poller::fetch_and_apply(self.api.as_ref(), &self.store, &self.bus, &process_id).await
        {
            Ok(outcome) => {
                self.stop_if_terminal(&outcome).await;
                Ok(outcome)
            }
            Err(e) => Err(self.surface(e.into()).await),
        }
    }

    /// Route one line of user text
    pub async fn handle_input(&self, text: &str) -> InputOutcome {
        let text = text.trim();
        if text.is_empty() {
            return InputOutcome::Ignored;
        }

        let history = {
            let mut state = self.store.lock().await;
            let history = state.conversation().chat_history();
            state.conversation_mut().push_user(text);

            match state.phase() {
                Phase::AwaitingConfirmation => {
                    debug!("Holding chat input until the plan is confirmed");
                    state.conversation_mut().push_assistant(notes::CONFIRM_REMINDER);
                    return InputOutcome::Reminded;
                }
                Phase::Running => {
                    let note = state.progress_note();
                    state.conversation_mut().push_assistant(note);
                    return InputOutcome::ProgressReported;
                }
                Phase::Idle | Phase::Finished => history,
            }
        };

        if self.classify_intent(text) == Intent::Research {
            let (topic, requirements) = split_topic(text, &self.default_requirements);
            return match self.start(&topic, &requirements).await {
                Ok(process_id) => InputOutcome::ResearchStarted { process_id },
                Err(e) => {
                    self.store
                        .lock()
                        .await
                        .conversation_mut()
                        .push_assistant(notes::transport_error(&e.to_string()));
                    InputOutcome::Failed(e)
                }
            };
        }

        match self.answer(text, history).await {
            Ok(_) => InputOutcome::Answered,
            Err(e) => InputOutcome::Failed(e),
        }
    }

    /// One ordinary chat turn outside the input router.
    ///
    /// Refused while a plan is awaiting confirmation.
    pub async fn ask(&self, question: &str) -> Result<String, ClientError> {
        let history = {
            let mut state = self.store.lock().await;
            if state.phase() == Phase::AwaitingConfirmation {
                return Err(ClientError::InvalidState(
                    "Confirm or cancel the pending research plan first".to_string(),
                ));
            }
            let history = state.conversation().chat_history();
            state.conversation_mut().push_user(question);
            history
        };
        self.answer(question, history).await
    }

    async fn answer(&self, question: &str, history: Vec<String>) -> Result<String, ClientError> {
        let request = ChatRequest {
            question: question.to_string(),
            conversation_history: history,
        };
        debug!("Sending chat question ({} prior messages)", request.conversation_history.len());

        match self.api.ask(&request).await {
            Ok(response) => {
                let answer = response.content().unwrap_or(notes::NO_ANSWER).to_string();
                self.store
                    .lock()
                    .await
                    .conversation_mut()
                    .push_assistant(answer.clone());
                Ok(answer)
            }
            Err(e) => {
                error!("Chat request failed: {}", e);
                let e = self.surface(e.into()).await;
                self.store
                    .lock()
                    .await
                    .conversation_mut()
                    .push_assistant(notes::transport_error(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Explicit panel navigation
    pub async fn navigate(&self, panel: Panel) -> Result<Panel, ClientError> {
        self.store.lock().await.navigate(panel)
    }

    /// Expand or collapse step `index` of the progress panel
    pub async fn toggle_step(&self, index: usize) -> Result<bool, ClientError> {
        let mut state = self.store.lock().await;
        let count = state.history().steps().len();
        if index >= count {
            return Err(ClientError::InvalidState(format!(
                "No step {} (the plan has {} steps)",
                index + 1,
                count
            )));
        }
        Ok(state.view_mut().toggle_step(index))
    }

    /// Whether a poll loop is currently running
    pub async fn is_polling(&self) -> bool {
        self.poll_handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_stopped())
    }

    /// Stop polling; safe to call repeatedly
    pub async fn shutdown(&self) {
        self.stop_polling().await;
    }

    async fn stop_polling(&self) -> bool {
        match self.poll_handle.lock().await.take() {
            Some(handle) => handle.stop(),
            None => false,
        }
    }

    async fn stop_if_terminal(&self, outcome: &ApplyOutcome) {
        if let Some(status) = outcome.terminal_status() {
            debug!("Out-of-band fetch observed terminal status {}", status);
            self.stop_polling().await;
        }
    }

    /// Put a failure on the transient error banner and hand it back
    async fn surface(&self, e: ClientError) -> ClientError {
        self.store
            .lock()
            .await
            .conversation_mut()
            .raise_error(e.to_string());
        e
    }
}
