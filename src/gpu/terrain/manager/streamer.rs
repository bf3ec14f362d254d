// ============================================
// Chunk Streamer - Загрузка/выгрузка чанков вокруг наблюдателя
// ============================================
//
// Unqueued -> Queued -> (Building) -> Built -> выгрузка -> Unqueued
//
// Желаемый набор пересчитывается только при смене текущего чанка.
// Сборки ограничены max_kicks_per_frame за вызов kick_chunk_loading.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ultraviolet::Vec3;

use super::builder::ChunkBuilder;
use super::chunk::{Chunk, ChunkLayout, ChunkState};
use super::worker::{BackgroundBuilder, BuildJob};
use crate::gpu::core::config::BuildMode;
use crate::gpu::render::culling::{is_chunk_visible, Frustum};
use crate::gpu::terrain::bounds::Aabb;
use crate::gpu::terrain::cache::ChunkId;
use crate::gpu::terrain::params::TerrainSettings;
use crate::gpu::terrain::road::RoadNetwork;

/// Параметры стриминга
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamingOptions {
    /// Радиус загрузки (Чебышёв, в чанках)
    pub render_distance: i32,
    pub max_kicks_per_frame: usize,
    pub build_mode: BuildMode,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self { render_distance: 8, max_kicks_per_frame: 1, build_mode: BuildMode::Blocking }
    }
}

/// Счётчики для лога кадра
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    pub desired: usize,
    pub loaded: usize,
    pub queued: usize,
    pub building: usize,
    pub vertices: u64,
    pub overflowed: usize,
}

/// Все id в квадрате радиуса R вокруг центра, ближние первыми
pub fn desired_ids(center: ChunkId, render_distance: i32) -> Vec<ChunkId> {
    let r = render_distance.max(0);
    let mut ids = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dz in -r..=r {
        for dx in -r..=r {
            ids.push(ChunkId::new(center.x + dx, center.z + dz));
        }
    }
    ids.sort_by_key(|id| (id.chebyshev(center), *id));
    ids
}

pub struct ChunkStreamer {
    builder: ChunkBuilder,
    options: StreamingOptions,
    background: Option<BackgroundBuilder>,
    settings: Arc<TerrainSettings>,
    roads: Arc<RoadNetwork>,

    chunks: HashMap<ChunkId, Chunk>,
    queue: VecDeque<ChunkId>,
    queued: HashSet<ChunkId>,
    building: HashSet<ChunkId>,
    desired: HashSet<ChunkId>,
    current_chunk: Option<ChunkId>,
}

impl ChunkStreamer {
    pub fn new(
        builder: ChunkBuilder,
        options: StreamingOptions,
        settings: Arc<TerrainSettings>,
        roads: Arc<RoadNetwork>,
    ) -> Self {
        let background = match options.build_mode {
            BuildMode::Blocking => None,
            BuildMode::Background => Some(BackgroundBuilder::new(builder.clone())),
        };
        log::info!(
            "Chunk streamer: {} backend, {:?} builds, radius {}, {} kick(s) per frame",
            builder.backend(), options.build_mode, options.render_distance, options.max_kicks_per_frame
        );

        Self {
            builder,
            options,
            background,
            settings,
            roads,
            chunks: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            building: HashSet::new(),
            desired: HashSet::new(),
            current_chunk: None,
        }
    }

    pub fn layout(&self) -> ChunkLayout {
        self.builder.layout()
    }

    pub fn settings(&self) -> &Arc<TerrainSettings> {
        &self.settings
    }

    pub fn roads(&self) -> &Arc<RoadNetwork> {
        &self.roads
    }

    /// Пересчитать желаемый набор, если наблюдатель сменил чанк.
    /// Возвращает true, если набор пересчитан.
    pub fn update(&mut self, observer: Vec3) -> bool {
        let current = self.layout().id_at(observer);
        if self.current_chunk == Some(current) {
            return false;
        }
        self.current_chunk = Some(current);

        let ordered = desired_ids(current, self.options.render_distance);
        self.desired = ordered.iter().copied().collect();

        // Выгрузка: ресурсы освобождаются вместе с чанком
        let before = self.chunks.len();
        let desired = &self.desired;
        self.chunks.retain(|id, _| desired.contains(id));
        let evicted = before - self.chunks.len();

        // Из очереди убираем то, что больше не нужно
        self.queue.retain(|id| desired.contains(id));
        self.queued.retain(|id| desired.contains(id));

        let mut enqueued = 0;
        for id in ordered {
            if self.enqueue(id) {
                enqueued += 1;
            }
        }

        log::debug!(
            "Observer entered chunk ({}, {}): {} evicted, {} enqueued",
            current.x, current.z, evicted, enqueued
        );
        true
    }

    /// Поставить id в очередь. Повторы и уже готовые чанки игнорируются.
    pub fn enqueue(&mut self, id: ChunkId) -> bool {
        if self.chunks.contains_key(&id) || self.queued.contains(&id) || self.building.contains(&id) {
            return false;
        }
        self.queue.push_back(id);
        self.queued.insert(id);
        true
    }

    /// Запустить не более max_kicks_per_frame сборок из очереди
    pub fn kick_chunk_loading(&mut self) -> usize {
        let mut kicked = 0;
        while kicked < self.options.max_kicks_per_frame {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&id);
            kicked += 1;

            let submitted = self.background.as_ref().map(|background| {
                background.submit(BuildJob {
                    id,
                    settings: Arc::clone(&self.settings),
                    roads: Arc::clone(&self.roads),
                })
            });
            match submitted {
                Some(true) => {
                    self.building.insert(id);
                }
                Some(false) => {
                    log::error!("Chunk builder thread is gone, building ({}, {}) inline", id.x, id.z);
                    self.build_now(id);
                }
                None => self.build_now(id),
            }
        }
        kicked
    }

    /// Забрать результаты фоновых сборок. Устаревшие (старая версия
    /// настроек) выбрасываются и ставятся в очередь заново.
    pub fn poll_completed(&mut self) -> usize {
        let Some(background) = &self.background else {
            return 0;
        };

        let mut results = Vec::new();
        while let Some(result) = background.try_recv() {
            results.push(result);
        }

        let mut installed = 0;
        for result in results {
            self.building.remove(&result.id);
            if !self.desired.contains(&result.id) {
                continue;
            }
            if result.version != self.settings.version {
                log::warn!(
                    "Dropping stale build of ({}, {}): version {} != {}",
                    result.id.x, result.id.z, result.version, self.settings.version
                );
                self.enqueue(result.id);
                continue;
            }
            match result.chunk {
                Ok(chunk) => {
                    self.chunks.insert(result.id, chunk);
                    installed += 1;
                }
                Err(e) => log::error!("Failed to build chunk ({}, {}): {}", result.id.x, result.id.z, e),
            }
        }
        installed
    }

    fn build_now(&mut self, id: ChunkId) {
        match self.builder.build(id, &self.settings, &self.roads) {
            Ok(chunk) => {
                self.chunks.insert(id, chunk);
            }
            Err(e) => log::error!("Failed to build chunk ({}, {}): {}", id.x, id.z, e),
        }
    }

    /// Заменить настройки и дорожную сеть (без перестройки)
    pub fn set_terrain(&mut self, settings: Arc<TerrainSettings>, roads: Arc<RoadNetwork>) {
        self.settings = settings;
        self.roads = roads;
    }

    /// Выгрузить и заново собрать все загруженные чанки текущими настройками
    pub fn reload_chunks(&mut self) -> usize {
        let mut ids: Vec<ChunkId> = self.chunks.keys().copied().collect();
        ids.sort();
        self.chunks.clear();

        for &id in &ids {
            self.build_now(id);
        }
        log::info!("Reloaded {} chunks with terrain version {}", ids.len(), self.settings.version);
        ids.len()
    }

    pub fn state(&self, id: ChunkId) -> ChunkState {
        if self.chunks.contains_key(&id) {
            ChunkState::Built
        } else if self.building.contains(&id) {
            ChunkState::Building
        } else if self.queued.contains(&id) {
            ChunkState::Queued
        } else {
            ChunkState::Unqueued
        }
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// Чанк колонки (x, z), содержащей мировую точку. Высота не важна.
    pub fn chunk_at(&self, pos: Vec3) -> Option<&Chunk> {
        self.chunks.get(&self.layout().id_at(pos))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn is_visible(&self, aabb: &Aabb, frustum: &Frustum, camera_pos: Vec3) -> bool {
        is_chunk_visible(aabb, frustum, camera_pos)
    }

    /// Непустые видимые чанки
    pub fn visible_chunks(&self, frustum: &Frustum, camera_pos: Vec3) -> Vec<&Chunk> {
        let mut visible: Vec<&Chunk> = self
            .chunks
            .values()
            .filter(|chunk| !chunk.is_empty() && self.is_visible(&chunk.aabb, frustum, camera_pos))
            .collect();
        visible.sort_by_key(|chunk| chunk.id);
        visible
    }

    pub fn current_chunk(&self) -> Option<ChunkId> {
        self.current_chunk
    }

    pub fn is_desired(&self, id: ChunkId) -> bool {
        self.desired.contains(&id)
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn building_count(&self) -> usize {
        self.building.len()
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            desired: self.desired.len(),
            loaded: self.chunks.len(),
            queued: self.queue.len(),
            building: self.building.len(),
            vertices: self.chunks.values().map(|c| c.vertex_count() as u64).sum(),
            overflowed: self.chunks.values().filter(|c| c.geometry.overflowed()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::gpu::terrain::mesher::CpuMesher;
    use crate::gpu::terrain::params::TerrainParameters;

    const CHUNK: f32 = 16.0;

    fn layout() -> ChunkLayout {
        ChunkLayout { chunk_size: CHUNK, tesselation: 4, base_height: -8.0 }
    }

    fn streamer(render_distance: i32, max_kicks: usize, build_mode: BuildMode) -> ChunkStreamer {
        let builder = ChunkBuilder::new(Arc::new(CpuMesher::new()), layout());
        let options = StreamingOptions { render_distance, max_kicks_per_frame: max_kicks, build_mode };
        let settings = Arc::new(TerrainSettings::new(TerrainParameters::flat(2.0)));
        ChunkStreamer::new(builder, options, settings, Arc::new(RoadNetwork::empty()))
    }

    fn center_of(x: i32, z: i32) -> Vec3 {
        Vec3::new((x as f32 + 0.5) * CHUNK, 0.0, (z as f32 + 0.5) * CHUNK)
    }

    fn load_all(streamer: &mut ChunkStreamer) {
        while streamer.queued_count() > 0 {
            streamer.kick_chunk_loading();
        }
    }

    fn wait_for_builds(streamer: &mut ChunkStreamer) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while streamer.building_count() > 0 && Instant::now() < deadline {
            streamer.poll_completed();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_chunk_at_ignores_height() {
        let mut streamer = streamer(0, 1, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        streamer.kick_chunk_loading();
        for y in [-500.0, 0.0, 40.0, 5000.0] {
            let pos = center_of(0, 0) + Vec3::new(0.0, y, 0.0);
            assert_eq!(streamer.chunk_at(pos).map(|c| c.id), Some(ChunkId::new(0, 0)));
        }
        assert!(streamer.chunk_at(center_of(1, 0)).is_none());
    }

    #[test]
    fn test_desired_set_size() {
        let mut streamer = streamer(2, 1, BuildMode::Blocking);
        assert!(streamer.update(center_of(0, 0)));
        assert_eq!(streamer.stats().desired, 25);
        assert_eq!(streamer.queued_count(), 25);
        assert_eq!(streamer.state(ChunkId::new(2, -2)), ChunkState::Queued);
        assert_eq!(streamer.state(ChunkId::new(3, 0)), ChunkState::Unqueued);
    }

    #[test]
    fn test_queue_is_nearest_first() {
        let ids = desired_ids(ChunkId::new(5, 5), 1);
        assert_eq!(ids[0], ChunkId::new(5, 5));
        assert_eq!(ids.len(), 9);
        assert!(ids[1..].iter().all(|id| id.chebyshev(ChunkId::new(5, 5)) == 1));
    }

    #[test]
    fn test_update_is_memoized() {
        let mut streamer = streamer(1, 1, BuildMode::Blocking);
        assert!(streamer.update(center_of(0, 0)));
        // Движение внутри того же чанка ничего не пересчитывает
        assert!(!streamer.update(center_of(0, 0) + Vec3::new(3.0, 100.0, -3.0)));
        assert_eq!(streamer.queued_count(), 9);
    }

    #[test]
    fn test_kick_is_throttled() {
        let mut streamer = streamer(2, 1, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        assert_eq!(streamer.kick_chunk_loading(), 1);
        assert_eq!(streamer.loaded_count(), 1);
        assert_eq!(streamer.queued_count(), 24);
        // Ближайший чанк собирается первым
        assert_eq!(streamer.state(ChunkId::new(0, 0)), ChunkState::Built);
    }

    #[test]
    fn test_empty_queue_kick_is_noop() {
        let mut streamer = streamer(1, 3, BuildMode::Blocking);
        assert_eq!(streamer.kick_chunk_loading(), 0);
        assert_eq!(streamer.loaded_count(), 0);
    }

    #[test]
    fn test_duplicate_enqueue_is_ignored() {
        let mut streamer = streamer(1, 1, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        assert!(!streamer.enqueue(ChunkId::new(1, 1)));
        streamer.kick_chunk_loading();
        assert!(!streamer.enqueue(ChunkId::new(0, 0)));
        assert_eq!(streamer.queued_count(), 8);
    }

    #[test]
    fn test_moving_evicts_and_loads_edges() {
        let mut streamer = streamer(2, 4, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        load_all(&mut streamer);
        assert_eq!(streamer.loaded_count(), 25);

        assert!(streamer.update(center_of(1, 0)));
        for z in -2..=2 {
            assert_eq!(streamer.state(ChunkId::new(-2, z)), ChunkState::Unqueued);
            assert_eq!(streamer.state(ChunkId::new(3, z)), ChunkState::Queued);
            assert_eq!(streamer.state(ChunkId::new(-1, z)), ChunkState::Built);
        }
        assert_eq!(streamer.loaded_count(), 20);
        assert_eq!(streamer.queued_count(), 5);
    }

    #[test]
    fn test_queued_ids_leaving_radius_are_dropped() {
        let mut streamer = streamer(1, 1, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        streamer.update(center_of(10, 10));
        assert_eq!(streamer.state(ChunkId::new(0, 0)), ChunkState::Unqueued);
        assert_eq!(streamer.queued_count(), 9);
    }

    #[test]
    fn test_reload_matches_fresh_build() {
        let mut streamer = streamer(1, 9, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        load_all(&mut streamer);
        let id = ChunkId::new(0, 0);
        let old = streamer.chunk(id).unwrap().host_snapshot();

        let settings = Arc::new(streamer.settings().next(TerrainParameters::flat(6.0)));
        streamer.set_terrain(Arc::clone(&settings), Arc::new(RoadNetwork::empty()));
        assert_eq!(streamer.reload_chunks(), 9);

        let reloaded = streamer.chunk(id).unwrap();
        assert_eq!(reloaded.params_version, settings.version);
        let fresh = ChunkBuilder::new(Arc::new(CpuMesher::new()), layout())
            .build(id, &settings, &RoadNetwork::empty())
            .unwrap();
        assert_eq!(reloaded.host_snapshot(), fresh.host_snapshot());
        assert_ne!(reloaded.host_snapshot(), old);
    }

    #[test]
    fn test_visible_chunks_skip_culled() {
        use crate::gpu::player::Camera;

        let mut streamer = streamer(2, 25, BuildMode::Blocking);
        streamer.update(center_of(0, 0));
        load_all(&mut streamer);

        let mut camera = Camera::new(1.0);
        camera.position = center_of(0, 0) + Vec3::new(0.0, 2.5, 0.0);
        camera.look_at(camera.position + Vec3::new(1.0, 0.0, 0.0));
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());

        let visible = streamer.visible_chunks(&frustum, camera.position);
        assert!(visible.iter().any(|chunk| chunk.id == ChunkId::new(0, 0)));
        assert!(visible.iter().any(|chunk| chunk.id == ChunkId::new(2, 0)));
        assert!(!visible.iter().any(|chunk| chunk.id == ChunkId::new(-2, 0)));
    }

    #[test]
    fn test_background_builds_complete() {
        let mut streamer = streamer(1, 9, BuildMode::Background);
        streamer.update(center_of(0, 0));
        assert_eq!(streamer.kick_chunk_loading(), 9);
        assert_eq!(streamer.state(ChunkId::new(0, 0)), ChunkState::Building);

        wait_for_builds(&mut streamer);
        assert_eq!(streamer.loaded_count(), 9);
        assert!(streamer.chunks().all(|chunk| chunk.params_version == streamer.settings().version));
    }

    #[test]
    fn test_stale_background_build_is_requeued() {
        let mut streamer = streamer(0, 1, BuildMode::Background);
        streamer.update(center_of(0, 0));
        streamer.kick_chunk_loading();

        let next = Arc::new(streamer.settings().next(TerrainParameters::flat(4.0)));
        streamer.set_terrain(next, Arc::new(RoadNetwork::empty()));
        wait_for_builds(&mut streamer);

        assert_eq!(streamer.state(ChunkId::new(0, 0)), ChunkState::Queued);
        streamer.kick_chunk_loading();
        wait_for_builds(&mut streamer);
        assert_eq!(streamer.chunk(ChunkId::new(0, 0)).unwrap().params_version, 1);
    }
}
