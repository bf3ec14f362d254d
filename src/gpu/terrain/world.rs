// ============================================
// Terrain World - Фасад террейна
// ============================================
//
// Владеет версией настроек, дорожной сетью, стримером и сервисом
// запросов. Смена параметров: новая версия, новая сеть при смене сида,
// полная перестройка загруженных чанков.

use std::sync::Arc;

use ultraviolet::Vec3;

use crate::gpu::core::config::WorldConfig;
use crate::gpu::render::culling::Frustum;
use crate::gpu::terrain::manager::{Chunk, ChunkBuilder, ChunkLayout, ChunkStreamer, StreamerStats, StreamingOptions};
use crate::gpu::terrain::mesher::ChunkMesher;
use crate::gpu::terrain::params::{TerrainParameters, TerrainSettings};
use crate::gpu::terrain::query::{GroundQuery, SpatialQueryService};
use crate::gpu::terrain::road::{RoadNetwork, RoadParams};

pub struct TerrainWorld {
    road_params: RoadParams,
    settings: Arc<TerrainSettings>,
    roads: Arc<RoadNetwork>,
    streamer: ChunkStreamer,
    queries: SpatialQueryService,
}

impl TerrainWorld {
    pub fn new(config: &WorldConfig, mesher: Arc<dyn ChunkMesher>) -> Self {
        let settings = Arc::new(TerrainSettings::new(config.terrain));
        let roads = Arc::new(RoadNetwork::generate(config.terrain.seed, &config.road));

        let layout = ChunkLayout {
            chunk_size: config.chunk_size,
            tesselation: config.tesselation,
            base_height: config.base_height,
        };
        let options = StreamingOptions {
            render_distance: config.render_distance,
            max_kicks_per_frame: config.max_kicks_per_frame,
            build_mode: config.build_mode,
        };
        let streamer = ChunkStreamer::new(
            ChunkBuilder::new(mesher, layout),
            options,
            Arc::clone(&settings),
            Arc::clone(&roads),
        );
        let queries = SpatialQueryService::new(Arc::clone(&settings), Arc::clone(&roads));

        Self { road_params: config.road, settings, roads, streamer, queries }
    }

    /// Кадр стриминга: пересчёт набора чанков и приём фоновых сборок
    pub fn update(&mut self, observer: Vec3) -> bool {
        let changed = self.streamer.update(observer);
        self.streamer.poll_completed();
        changed
    }

    pub fn kick_chunk_loading(&mut self) -> usize {
        self.streamer.kick_chunk_loading()
    }

    pub fn visible_chunks(&self, frustum: &Frustum, camera_pos: Vec3) -> Vec<&Chunk> {
        self.streamer.visible_chunks(frustum, camera_pos)
    }

    /// Применить новые параметры. Одинаковые параметры ничего не меняют.
    /// Возвращает текущую версию настроек.
    pub fn set_terrain_params(&mut self, params: TerrainParameters) -> u64 {
        if params == self.settings.params {
            return self.settings.version;
        }

        let seed_changed = params.seed != self.settings.params.seed;
        self.settings = Arc::new(self.settings.next(params));
        if seed_changed {
            self.roads = Arc::new(RoadNetwork::generate(params.seed, &self.road_params));
        }
        log::info!(
            "Terrain parameters changed: version {}{}",
            self.settings.version,
            if seed_changed { ", road network regenerated" } else { "" }
        );

        self.queries.set_terrain(Arc::clone(&self.settings), Arc::clone(&self.roads));
        self.streamer.set_terrain(Arc::clone(&self.settings), Arc::clone(&self.roads));
        self.streamer.reload_chunks();
        self.settings.version
    }

    /// Точка появления: начало трассы, опущенное (или поднятое) на землю
    pub fn spawn_point(&self) -> Vec3 {
        let anchor = self.roads.spawn_anchor().unwrap_or_else(Vec3::zero);
        let query = self.queries.query_ground(anchor);
        if query.found {
            anchor - Vec3::new(0.0, query.distance, 0.0)
        } else {
            anchor
        }
    }

    pub fn query_ground(&self, pos: Vec3) -> GroundQuery {
        self.queries.query_ground(pos)
    }

    /// Коллизия по сегментам загруженного чанка, иначе not_found
    pub fn query_collision(&self, pos: Vec3) -> GroundQuery {
        self.queries.query_collision(pos, self.streamer.chunk_at(pos))
    }

    pub fn surface_height(&self, x: f32, z: f32) -> f32 {
        self.queries.surface_height(x, z)
    }

    pub fn is_submerged(&self, pos: Vec3) -> bool {
        self.queries.is_submerged(pos)
    }

    pub fn stats(&self) -> StreamerStats {
        self.streamer.stats()
    }

    pub fn settings(&self) -> &Arc<TerrainSettings> {
        &self.settings
    }

    pub fn roads(&self) -> &RoadNetwork {
        &self.roads
    }

    pub fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    pub fn queries(&self) -> &SpatialQueryService {
        &self.queries
    }
}
