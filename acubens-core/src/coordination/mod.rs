mod broadcast;
mod coordinator;
mod lease_store;

pub use broadcast::EventPublisher;
pub use coordinator::LockCoordinator;
pub use lease_store::{AcquireOutcome, LeaseStore};
