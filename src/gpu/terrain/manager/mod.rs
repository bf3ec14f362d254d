// ============================================
// Chunk Manager - Стриминг и сборка чанков
// ============================================

mod builder;
mod chunk;
mod streamer;
mod worker;

pub use builder::ChunkBuilder;
pub use chunk::{Chunk, ChunkLayout, ChunkState};
pub use streamer::{desired_ids, ChunkStreamer, StreamerStats, StreamingOptions};
