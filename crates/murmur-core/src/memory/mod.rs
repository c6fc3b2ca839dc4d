pub mod archive;
pub mod box_embedder;
pub mod box_vector;
pub mod buffer;
pub mod clock;
pub mod codec;
pub mod embedder;
pub mod in_memory;
pub mod partition;
pub mod retrieval;
pub mod service;
pub mod summary;
pub mod task;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_support;
