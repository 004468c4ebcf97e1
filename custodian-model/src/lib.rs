//! Shared data models for the Custodian identity core.
//!
//! These types are safe to hand across a trust boundary: identifiers, the
//! owned [`Task`] entity and the redacted [`PublicIdentity`] view. Nothing in
//! this crate carries credential material.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), deny(missing_docs))]

pub mod ids;
pub mod public;
pub mod task;

pub use ids::{IdentityId, TaskId};
pub use public::PublicIdentity;
pub use task::Task;
