// ============================================
// Chunk Id - Идентификатор чанка
// ============================================

use ultraviolet::Vec3;

use crate::gpu::terrain::bounds::Aabb;

/// Ключ чанка: (chunk_x, chunk_z), y всегда 0
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ChunkId {
    pub x: i32,
    pub z: i32,
}

impl ChunkId {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Чанк, содержащий мировую позицию: floor(pos / chunk_size)
    pub fn from_world(pos: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).floor() as i32,
            z: (pos.z / chunk_size).floor() as i32,
        }
    }

    /// Расстояние Чебышёва по x/z
    #[inline]
    pub fn chebyshev(&self, other: ChunkId) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Минимальный угол чанка в мире
    pub fn origin(&self, chunk_size: f32, base_height: f32) -> Vec3 {
        Vec3::new(self.x as f32 * chunk_size, base_height, self.z as f32 * chunk_size)
    }

    /// Кубический объём чанка
    pub fn aabb(&self, chunk_size: f32, base_height: f32) -> Aabb {
        let min = self.origin(chunk_size, base_height);
        Aabb::new(min, min + Vec3::broadcast(chunk_size))
    }

    /// Объём чанка вместе с соседями 3x3 (консервативный отбор дорог)
    pub fn neighborhood_aabb(&self, chunk_size: f32, base_height: f32) -> Aabb {
        ChunkId::new(self.x - 1, self.z - 1)
            .aabb(chunk_size, base_height)
            .union(&ChunkId::new(self.x + 1, self.z + 1).aabb(chunk_size, base_height))
    }
}
