// ============================================
// Road Module - Процедурная трасса
// ============================================

mod generator;
mod segment;

pub use generator::{RoadNetwork, RoadParams};
pub use segment::{GpuTrackSegment, TrackSegment};
