//! Engine orchestration.

pub mod core;

pub use core::{EMBED_BATCH_SIZE, IngestReport, RagBackends, RagEngine};
