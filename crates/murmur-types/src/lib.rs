//! Shared domain types for murmur.
//!
//! This crate contains the core domain types of the conversational memory
//! subsystem: inbound messages, turns, partition keys, collection names,
//! archived records, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, and the
//! hashing/normalization crates needed to derive collection names.

pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
