mod config;
mod coordination;
mod metrics;

pub use config::Properties;
pub use coordination::{AcquireOutcome, EventPublisher, LeaseStore, LockCoordinator};
