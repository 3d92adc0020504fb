pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod poller;
pub mod project;
pub mod server;
pub mod store;
pub mod webhook;
pub mod wire;

pub use error::GateError;
pub use gate::{GateConfig, StatusGate, UpdateOutcome, UpdatePlan, WebhookRouting};
