//! Document retrieval: query embedding and similarity search over the
//! pre-built vector index.

pub mod embeddings;
pub mod errors;
pub mod index;

pub use embeddings::{Embedder, HttpEmbedder};
pub use errors::RetrievalError;
pub use index::{IndexedChunk, MemoryIndex, RetrievedDocument, VectorIndex};
