// ============================================
// Render Module - Отбор видимых чанков
// ============================================

pub mod culling;

pub use culling::{is_chunk_visible, Frustum};
