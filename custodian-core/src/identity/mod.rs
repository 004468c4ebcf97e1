//! Identity records and the invariants that guard them.

mod locks;
mod record;
mod value_objects;
mod writer;

pub use locks::{IdentityLockGuard, IdentityLocks};
pub use record::{DeletionReceipt, IdentityRecord, NewIdentity, NewIdentityRequest};
pub use value_objects::{Age, Email, Name, Password};
pub use writer::IdentityWriter;
