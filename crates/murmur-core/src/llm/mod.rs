//! The LLM port consumed by the daily summary pass.

pub mod box_provider;
pub mod provider;
