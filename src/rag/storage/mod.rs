//! Vector index backends.

pub mod factory;
pub mod memory_index;
pub mod sqlite_index;
pub mod sqlite_vec_loader;
pub mod vector_index;

pub use factory::create_vector_index;
pub use memory_index::{InMemoryVectorIndex, cosine_similarity};
pub use sqlite_index::SqliteVectorIndex;
pub use sqlite_vec_loader::init_sqlite_vec_extension;
pub use vector_index::{IndexFuture, IndexedChunk, VectorHit, VectorIndex};
