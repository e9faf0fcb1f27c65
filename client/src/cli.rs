//! CLI interface for DeepResearch
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the terminal client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DeepResearch terminal client
///
/// Chat with the DeepResearch assistant, start research sessions, confirm
/// their plans and read the final reports from the terminal.
#[derive(Parser, Debug)]
#[command(name = "deepresearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the research backend base URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat with research sessions
    Chat,

    /// Run one research session to completion
    Research {
        /// What to research
        topic: String,

        /// Extra requirements for the research plan
        #[arg(short, long)]
        requirements: Option<String>,

        /// Confirm the plan without asking
        #[arg(short, long)]
        yes: bool,

        /// Write the report to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show the backend status of a research process
    Status {
        /// Process ID returned when the research was started
        process_id: String,
    },

    /// Ask the backend to cancel a research process
    Cancel {
        /// Process ID returned when the research was started
        process_id: String,
    },

    /// Ask one ordinary chat question
    Ask {
        /// The question
        question: String,
    },
}
