//! Observability setup shared by murmur binaries.

pub mod tracing_setup;
