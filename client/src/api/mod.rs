//! Research backend API
//!
//! This module provides the transport seam between the session state machine
//! and the research backend. The `ResearchApi` trait is the contract the
//! controller and poller program against; `HttpResearchApi` is the reqwest
//! implementation used by the binary, and tests substitute scripted doubles.
//!
//! Every failure (network, non-2xx, malformed JSON) surfaces as a
//! `TransportError`.

use async_trait::async_trait;
use sdk::errors::TransportError;
use sdk::types::{Ack, ChatRequest, ChatResponse, Snapshot, StartRequest, StartResponse};

pub mod http;

pub use http::HttpResearchApi;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Research backend operations consumed by the client
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// `POST /research/start`
    async fn start(&self, request: &StartRequest) -> Result<StartResponse>;

    /// `GET /research/status/{process_id}`
    async fn status(&self, process_id: &str) -> Result<Snapshot>;

    /// `POST /research/confirm/{process_id}`
    async fn confirm(&self, process_id: &str) -> Result<Ack>;

    /// `POST /research/cancel/{process_id}`
    async fn cancel(&self, process_id: &str) -> Result<Ack>;

    /// `POST /chat/question`
    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
