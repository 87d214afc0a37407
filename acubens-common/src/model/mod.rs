mod api;
mod events;
mod lease;

pub use api::{
    AcquireReply, AcquireRequest, ReleaseReply, ReleaseRequest, RenewReply, RenewRequest,
    RenewStatus, StatusReply,
};
pub use events::LockEvent;
pub use lease::{Lease, LeaseTable, RemoteHolder};
