mod exception;
mod model;
mod utils;

pub use model::{
    AcquireReply, AcquireRequest, Lease, LeaseTable, LockEvent, ReleaseReply, ReleaseRequest,
    RemoteHolder, RenewReply, RenewRequest, RenewStatus, StatusReply,
};
pub use utils::{EnvUtils, IdGenerator};

pub mod prelude;

#[macro_use]
pub(crate) mod macros;
