pub mod frustum;

pub use frustum::{is_chunk_visible, Frustum};
