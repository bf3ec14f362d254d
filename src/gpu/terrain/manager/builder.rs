// ============================================
// Chunk Builder - Сборка одного чанка
// ============================================

use std::sync::Arc;
use std::time::Instant;

use super::chunk::{Chunk, ChunkLayout};
use crate::gpu::terrain::cache::ChunkId;
use crate::gpu::terrain::mesher::{ChunkMesher, MeshRequest, MesherError};
use crate::gpu::terrain::params::TerrainSettings;
use crate::gpu::terrain::road::RoadNetwork;

/// Выбирает сегменты дороги для чанка и вызывает бэкенд
#[derive(Clone)]
pub struct ChunkBuilder {
    mesher: Arc<dyn ChunkMesher>,
    layout: ChunkLayout,
}

impl ChunkBuilder {
    pub fn new(mesher: Arc<dyn ChunkMesher>, layout: ChunkLayout) -> Self {
        Self { mesher, layout }
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn backend(&self) -> &'static str {
        self.mesher.label()
    }

    /// Собрать чанк целиком одной версией настроек
    pub fn build(&self, id: ChunkId, settings: &TerrainSettings, roads: &RoadNetwork) -> Result<Chunk, MesherError> {
        let segment_indices = roads.segments_for_chunk(id, self.layout.chunk_size, self.layout.base_height);
        let request = MeshRequest {
            id,
            chunk_size: self.layout.chunk_size,
            tesselation: self.layout.tesselation,
            base_height: self.layout.base_height,
            settings,
            roads,
            segment_indices: &segment_indices,
        };
        let start = Instant::now();
        let geometry = self.mesher.build(&request)?;
        log::debug!(
            "Built chunk ({}, {}): {} vertices in {:.2?}",
            id.x, id.z, geometry.vertex_count(), start.elapsed()
        );

        Ok(Chunk {
            id,
            aabb: self.layout.aabb(id),
            segment_indices,
            geometry,
            params_version: settings.version,
        })
    }
}
