//! DeepResearch SDK
//!
//! Shared library providing the research backend wire protocol and the error
//! taxonomy used by the DeepResearch client.

/// Error types and handling
pub mod errors;

/// Request/response types of the research backend
pub mod types;

// Re-export commonly used types
pub use errors::{ClientError, ClientErrorExt, TransportError};
pub use types::{
    Ack, ChatRequest, ChatResponse, ResearchStatus, ResearchStep, SearchResult, Snapshot,
    StartRequest, StartResponse,
};
