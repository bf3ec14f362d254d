// ============================================
// Terrain Module - Процедурный террейн на marching cubes
// ============================================

pub mod bounds;
pub mod cache;
pub mod generation;
pub mod manager;
pub mod mesh;
pub mod mesher;
pub mod params;
pub mod query;
pub mod road;
pub mod world;

// Re-exports
pub use cache::ChunkId;
pub use mesh::TerrainVertex;
pub use params::{TerrainParameters, TerrainSettings};
pub use query::{GroundQuery, SpatialQueryService};
pub use world::TerrainWorld;
