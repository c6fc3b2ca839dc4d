//! Infrastructure layer for murmur.
//!
//! Contains implementations of the port traits defined in `murmur-core`:
//! LanceDB vector storage, local and remote embedders, the OpenAI-compatible
//! LLM provider, and the configuration loader.

pub mod config;
pub mod embedding;
pub mod llm;
pub mod vector;
