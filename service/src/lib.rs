//! The quicktype background service.
//!
//! Captures keystrokes, keeps the word under composition, asks the language
//! index for completions and talks to a presentation client over a local
//! line-delimited JSON channel.

pub mod attach;
pub mod capture;
pub mod caret;
pub mod config;
pub mod inject;
pub mod ipc;
pub mod orchestrator;
pub mod worker;

pub use config::ServiceConfig;
pub use orchestrator::{AdminTask, Collaborators, Orchestrator, Service};
pub use worker::{Worker, WorkerEvent};
