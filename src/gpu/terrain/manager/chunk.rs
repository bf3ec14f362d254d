// ============================================
// Chunk - Построенный чанк и его раскладка
// ============================================

use ultraviolet::Vec3;

use crate::gpu::terrain::bounds::Aabb;
use crate::gpu::terrain::cache::ChunkId;
use crate::gpu::terrain::mesher::ChunkGeometry;

/// Геометрия сетки чанков, общая для всего мира
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkLayout {
    pub chunk_size: f32,
    pub tesselation: u32,
    /// Мировая Y нижней грани каждого чанка
    pub base_height: f32,
}

impl ChunkLayout {
    pub fn id_at(&self, pos: Vec3) -> ChunkId {
        ChunkId::from_world(pos, self.chunk_size)
    }

    pub fn aabb(&self, id: ChunkId) -> Aabb {
        id.aabb(self.chunk_size, self.base_height)
    }
}

/// Состояние id в стримере
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Unqueued,
    Queued,
    /// Отправлен в фоновый поток, результат ещё не забран
    Building,
    Built,
}

/// Готовый к отрисовке чанк. Создаётся только после полной сборки,
/// поэтому частично записанной геометрии снаружи не бывает.
#[derive(Debug)]
pub struct Chunk {
    pub id: ChunkId,
    pub aabb: Aabb,
    /// Индексы сегментов дороги, учтённые при сборке
    pub segment_indices: Vec<u32>,
    pub geometry: ChunkGeometry,
    /// Версия TerrainSettings, которой собран чанк
    pub params_version: u64,
}

impl Chunk {
    pub fn vertex_count(&self) -> u32 {
        self.geometry.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }
}

#[cfg(test)]
impl Chunk {
    /// Треугольники хоста в каноническом порядке (порядок сборки не фиксирован)
    pub fn host_snapshot(&self) -> Vec<[u32; 9]> {
        let vertices = self.geometry.host_vertices().unwrap_or(&[]);
        let mut triangles: Vec<[u32; 9]> = vertices
            .chunks(3)
            .map(|tri| {
                let mut key = [0u32; 9];
                for (v, vertex) in tri.iter().enumerate() {
                    for axis in 0..3 {
                        key[v * 3 + axis] = vertex.position[axis].to_bits();
                    }
                }
                key
            })
            .collect();
        triangles.sort_unstable();
        triangles
    }
}
