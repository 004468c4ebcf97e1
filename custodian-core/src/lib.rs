//! # Custodian Core
//!
//! Identity and credential core: owns the lifecycle of identity records,
//! their password credentials and their active session tokens.
//!
//! ## Overview
//!
//! - **Credentials**: Argon2id hashing with a configurable work factor and
//!   password shape rules applied before anything is hashed
//! - **Sessions**: signed tokens that are only honoured while they remain in
//!   their owner's token list, so revocation takes effect immediately
//! - **Authentication**: email and password checks that fail with one generic
//!   error regardless of which factor was wrong
//! - **Deletion**: owned tasks are removed before the identity, and a failed
//!   cascade blocks the deletion
//!
//! Persistence is pluggable through [`repositories::IdentityStore`] and
//! [`repositories::TaskStore`]; [`infrastructure::memory`] provides
//! in-process implementations.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use custodian_core::{
//!     config::ConfigLoader,
//!     identity::NewIdentityRequest,
//!     infrastructure::{InMemoryIdentityStore, InMemoryTaskStore},
//!     service::IdentityService,
//! };
//!
//! async fn sign_up() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load()?;
//!     let service = IdentityService::new(
//!         config,
//!         Arc::new(InMemoryIdentityStore::new()),
//!         Arc::new(InMemoryTaskStore::new()),
//!     )?;
//!
//!     let request =
//!         NewIdentityRequest::new("Ada", "ada@example.com", "analytical-engine");
//!     service.register(&request).await?;
//!
//!     let session = service.login("ada@example.com", "analytical-engine").await?;
//!     let me = service.authenticate(&session.token).await?;
//!     assert_eq!(me.email, "ada@example.com");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), deny(missing_docs))]

pub mod authenticator;
pub mod cascade;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod infrastructure;
pub mod repositories;
pub mod serializer;
pub mod service;
pub mod tokens;

pub use custodian_model::{IdentityId, PublicIdentity, Task, TaskId};
pub use error::{Field, IdentityError, Result, StoreError, ValidationError};
pub use service::{IdentityService, ProfileUpdate, Session};
