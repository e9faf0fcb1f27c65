//! Shared helpers for the session integration tests
//!
//! `ScriptedApi` is an in-memory `ResearchApi` whose replies are queued up
//! front. Status replies can be gated so a test decides when a fetch
//! completes, which is how out-of-order completions are forced.

#![allow(dead_code)]

use async_trait::async_trait;
use deepresearch_client::api::{ResearchApi, Result};
use deepresearch_client::config::Config;
use deepresearch_client::controller::SessionController;
use deepresearch_client::message_bus::{Event, EventType, MessageBus};
use sdk::errors::TransportError;
use sdk::types::{
    Ack, ChatRequest, ChatResponse, ResearchStatus, Snapshot, StartRequest, StartResponse,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A call the client made
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(StartRequest),
    Status(String),
    Confirm(String),
    Cancel(String),
    Ask(ChatRequest),
}

struct StatusStep {
    reply: Result<Snapshot>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Releases a gated status reply
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

#[derive(Default)]
struct Script {
    starts: VecDeque<Result<StartResponse>>,
    statuses: VecDeque<StatusStep>,
    /// Reply once `statuses` is exhausted
    status_fallback: Option<Result<Snapshot>>,
    confirms: VecDeque<Result<Ack>>,
    cancels: VecDeque<Result<Ack>>,
    asks: VecDeque<Result<ChatResponse>>,
    calls: Vec<Call>,
    started: usize,
}

/// Scripted in-memory research backend
#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn push_start(&self, reply: Result<StartResponse>) {
        self.with(|s| s.starts.push_back(reply));
    }

    pub fn push_status(&self, reply: Result<Snapshot>) {
        self.with(|s| s.statuses.push_back(StatusStep { reply, gate: None }));
    }

    /// Queue a status reply that is held back until the gate is opened
    pub fn push_gated_status(&self, reply: Result<Snapshot>) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.with(|s| {
            s.statuses.push_back(StatusStep {
                reply,
                gate: Some(rx),
            })
        });
        Gate(tx)
    }

    pub fn set_status_fallback(&self, reply: Result<Snapshot>) {
        self.with(|s| s.status_fallback = Some(reply));
    }

    pub fn push_confirm(&self, reply: Result<Ack>) {
        self.with(|s| s.confirms.push_back(reply));
    }

    pub fn push_cancel(&self, reply: Result<Ack>) {
        self.with(|s| s.cancels.push_back(reply));
    }

    pub fn push_ask(&self, reply: Result<ChatResponse>) {
        self.with(|s| s.asks.push_back(reply));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn status_calls(&self) -> usize {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, Call::Status(_)))
                .count()
        })
    }

    pub fn confirm_calls(&self) -> usize {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, Call::Confirm(_)))
                .count()
        })
    }

    pub fn ask_requests(&self) -> Vec<ChatRequest> {
        self.with(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Ask(request) => Some(request.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}

#[async_trait]
impl ResearchApi for ScriptedApi {
    async fn start(&self, request: &StartRequest) -> Result<StartResponse> {
        self.with(|s| {
            s.calls.push(Call::Start(request.clone()));
            s.started += 1;
            let n = s.started;
            s.starts.pop_front().unwrap_or_else(|| {
                Ok(StartResponse {
                    process_id: format!("p{}", n),
                    message: None,
                })
            })
        })
    }

    async fn status(&self, process_id: &str) -> Result<Snapshot> {
        let step = self.with(|s| {
            s.calls.push(Call::Status(process_id.to_string()));
            s.statuses.pop_front()
        });

        match step {
            Some(StatusStep { reply, gate }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                reply
            }
            None => self.with(|s| {
                s.status_fallback
                    .clone()
                    .unwrap_or_else(|| Err(TransportError::Network("no scripted status".into())))
            }),
        }
    }

    async fn confirm(&self, process_id: &str) -> Result<Ack> {
        self.with(|s| {
            s.calls.push(Call::Confirm(process_id.to_string()));
            s.confirms.pop_front().unwrap_or_else(|| Ok(Ack::default()))
        })
    }

    async fn cancel(&self, process_id: &str) -> Result<Ack> {
        self.with(|s| {
            s.calls.push(Call::Cancel(process_id.to_string()));
            s.cancels.pop_front().unwrap_or_else(|| Ok(Ack::default()))
        })
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.with(|s| {
            s.calls.push(Call::Ask(request.clone()));
            s.asks.pop_front().unwrap_or_else(|| {
                Ok(ChatResponse {
                    answer: Some("ok".to_string()),
                    ..ChatResponse::default()
                })
            })
        })
    }
}

/// Default config with the poll interval used by these tests (6 s)
pub fn config() -> Config {
    Config::default()
}

pub fn interval() -> Duration {
    config().polling.interval()
}

/// Controller wired to `api`, with an `All` subscription on its bus
pub async fn controller(
    api: &Arc<ScriptedApi>,
    config: &Config,
) -> (SessionController, mpsc::Receiver<Event>) {
    let bus = Arc::new(MessageBus::new());
    let events = bus.subscribe(EventType::All).await;
    let api: Arc<dyn ResearchApi> = Arc::clone(api) as Arc<dyn ResearchApi>;
    (SessionController::new(api, bus, config), events)
}

/// Let spawned tasks run; moves a paused clock by 10 ms, well short of a
/// poll interval
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Drain whatever events are queued right now
pub fn drain(events: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn status(status: ResearchStatus) -> Snapshot {
    Snapshot::with_status(status)
}

pub fn waiting(plan: &str) -> Snapshot {
    Snapshot {
        progress: 10,
        plan: Some(plan.to_string()),
        ..status(ResearchStatus::WaitingConfirmation)
    }
}

pub fn researching(progress: u32) -> Snapshot {
    Snapshot {
        progress,
        ..status(ResearchStatus::Researching)
    }
}

pub fn completed(report: &str) -> Snapshot {
    Snapshot {
        progress: 100,
        report: Some(report.to_string()),
        ..status(ResearchStatus::Completed)
    }
}

pub fn failed(error: &str) -> Snapshot {
    Snapshot {
        error: Some(error.to_string()),
        ..status(ResearchStatus::Error)
    }
}

pub fn network_error() -> TransportError {
    TransportError::Network("connection refused".to_string())
}
