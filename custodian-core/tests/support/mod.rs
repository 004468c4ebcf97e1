//! Shared helpers for custodian-core integration tests.

#![allow(dead_code)]

pub mod harness;
pub mod stores;
