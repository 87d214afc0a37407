mod cache;
mod config;
mod events;
mod reconciler;
mod transport;

pub use cache::{CacheOutcome, ClientLockCache};
pub use config::ClientProperties;
pub use events::EventPump;
pub use reconciler::{
    ClientIdentity, LockReconciler, ReconcilerHandle, ReconcilerNotice, ResourceView, SessionMode,
};
pub use transport::{CoordinatorTransport, HttpTransport};
