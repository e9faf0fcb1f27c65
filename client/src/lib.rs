//! DeepResearch Client Library
//!
//! This library provides the research session state machine of the
//! DeepResearch client. It is used by both the terminal binary and
//! integration tests.

/// Configuration management module
pub mod config;

/// Research backend API
pub mod api;

/// Message bus for client events
pub mod message_bus;

/// Chat transcript and transient errors
pub mod conversation;

/// Session state: history reconciliation, view selection, state container
pub mod session;

/// Status poller
pub mod poller;

/// Session controller and intent detection
pub mod controller;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

/// Plain-text panel rendering
pub mod render;
