// ============================================
// Mesh Module - Вершины и таблицы marching cubes
// ============================================

pub mod tables;
pub mod vertex;

pub use vertex::TerrainVertex;
