pub mod chunk_id;

pub use chunk_id::ChunkId;
