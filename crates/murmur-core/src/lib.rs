//! Conversational memory logic and port trait definitions for murmur.
//!
//! This crate defines the "ports" (embedder, vector store, LLM provider)
//! that the infrastructure layer implements, and the memory subsystem built
//! on top of them. It depends only on `murmur-types` -- never on
//! `murmur-infra` or any database/IO crate.

pub mod llm;
pub mod memory;
