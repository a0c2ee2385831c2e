//! Core abstractions for Keepsake: the blob storage contract and its error taxonomy.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod storage;

#[cfg(feature = "conformance")]
pub mod conformance;
