// ============================================
// App - Headless пролёт над террейном
// ============================================
// Каждый кадр: камера движется по трассе, стример пересчитывает
// набор чанков, собирает не больше max_kicks_per_frame чанков,
// видимые чанки отбираются по frustum. Статистика пишется в лог.

use std::sync::Arc;
use std::time::Instant;

use ultraviolet::Vec3;

use crate::gpu::core::config::{Backend, WorldConfig};
use crate::gpu::player::{Camera, FlightPath};
use crate::gpu::render::culling::Frustum;
use crate::gpu::terrain::mesher::{ChunkMesher, CpuMesher, GpuMesher};
use crate::gpu::terrain::TerrainWorld;

/// Высота глаз над точкой появления
const EYE_OFFSET: f32 = 20.0;
/// Скорость пролёта, единиц в секунду
const FLY_SPEED: f32 = 120.0;
/// Шаг симуляции кадра
const FRAME_DT: f32 = 1.0 / 60.0;
/// Кадров по умолчанию (переопределяется первым аргументом)
const DEFAULT_FRAMES: u32 = 600;
/// Как часто писать статистику
const LOG_EVERY_FRAMES: u32 = 60;

/// Статистика одного кадра
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub kicked: usize,
    pub visible: usize,
    pub visible_vertices: u64,
}

/// Главное приложение
pub struct App {
    world: TerrainWorld,
    camera: Camera,
    flight: FlightPath,
    frame: u32,
}

impl App {
    pub fn new(config: &WorldConfig, mesher: Arc<dyn ChunkMesher>) -> Self {
        let world = TerrainWorld::new(config, mesher);

        let spawn = world.spawn_point();
        let mut path: Vec<Vec3> = world.roads().path().to_vec();
        if path.is_empty() {
            path.push(spawn);
        }
        let flight = FlightPath::new(&path, FLY_SPEED);

        let mut camera = Camera::new(16.0 / 9.0);
        camera.position = spawn + Vec3::new(0.0, EYE_OFFSET, 0.0);
        let (_, dir) = flight.sample();
        camera.look_at(camera.position + dir);

        log::info!("Spawn point: ({:.1}, {:.1}, {:.1})", spawn.x, spawn.y, spawn.z);
        Self { world, camera, flight, frame: 0 }
    }

    pub fn world(&self) -> &TerrainWorld {
        &self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Один кадр: движение, стриминг, culling
    pub fn frame(&mut self, dt: f32) -> FrameStats {
        self.flight.advance(dt);
        let (on_path, dir) = self.flight.sample();
        self.camera.position = on_path + Vec3::new(0.0, EYE_OFFSET, 0.0);
        self.camera.look_at(self.camera.position + dir);

        self.world.update(self.camera.position);
        let kicked = self.world.kick_chunk_loading();

        let frustum = Frustum::from_view_projection(&self.camera.view_projection_matrix());
        let visible = self.world.visible_chunks(&frustum, self.camera.position);
        let stats = FrameStats {
            kicked,
            visible: visible.len(),
            visible_vertices: visible.iter().map(|c| c.vertex_count() as u64).sum(),
        };

        self.frame += 1;
        if self.frame % LOG_EVERY_FRAMES == 0 {
            let streamer = self.world.stats();
            let ground = self.world.query_ground(self.camera.position);
            log::info!(
                "frame {}: loaded {}/{} (queued {}, building {}), visible {} ({} vertices), altitude {:.1}{}",
                self.frame,
                streamer.loaded,
                streamer.desired,
                streamer.queued,
                streamer.building,
                stats.visible,
                stats.visible_vertices,
                ground.distance,
                if self.world.is_submerged(self.camera.position) { ", under water" } else { "" },
            );
        }
        stats
    }
}

/// Бэкенд из конфига. GPU без адаптера откатывается на CPU.
pub fn select_mesher(config: &WorldConfig) -> Arc<dyn ChunkMesher> {
    match config.backend {
        Backend::Cpu => Arc::new(CpuMesher::new()),
        Backend::Gpu => match GpuMesher::new() {
            Ok(mesher) => Arc::new(mesher),
            Err(e) => {
                log::warn!("{}, falling back to CPU mesher", e);
                Arc::new(CpuMesher::new())
            }
        },
    }
}

/// Запуск пролёта
pub fn run() {
    env_logger::init();

    let config = match WorldConfig::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    let frames = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u32>().ok())
        .unwrap_or(DEFAULT_FRAMES);

    let mesher = select_mesher(&config);
    log::info!(
        "Marching terrain: {} mesher, chunk {} (T = {}), radius {}, {} frames",
        mesher.label(), config.chunk_size, config.tesselation, config.render_distance, frames
    );

    let mut app = App::new(&config, mesher);
    let start = Instant::now();
    let mut kicked_total = 0;
    for _ in 0..frames {
        kicked_total += app.frame(FRAME_DT).kicked;
    }

    let stats = app.world().stats();
    log::info!(
        "Done in {:.2}s: {} builds, {} chunks loaded, {} vertices, {} overflowed",
        start.elapsed().as_secs_f32(),
        kicked_total,
        stats.loaded,
        stats.vertices,
        stats.overflowed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::terrain::params::TerrainParameters;
    use crate::gpu::terrain::road::RoadParams;

    #[test]
    fn test_frames_stream_and_cull() {
        let config = WorldConfig {
            chunk_size: 64.0,
            render_distance: 1,
            tesselation: 4,
            max_kicks_per_frame: 2,
            base_height: -32.0,
            terrain: TerrainParameters::flat(0.0),
            road: RoadParams { spread: 300.0, radius: 8.0, ..Default::default() },
            ..Default::default()
        };
        let mut app = App::new(&config, Arc::new(CpuMesher::new()));

        let first = app.frame(FRAME_DT);
        assert_eq!(first.kicked, 2);
        for _ in 0..10 {
            app.frame(FRAME_DT);
        }
        let stats = app.world().stats();
        assert_eq!(stats.desired, 9);
        assert!(stats.loaded >= 9 || stats.queued > 0);
    }
}
