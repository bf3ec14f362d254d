// ============================================
// Spatial Query Service - Точечные запросы к полю плотности
// ============================================
//
// Синхронные запросы для физики, расстановки объектов и камеры.
// Вычисляются тем же DensityField, что и меши, поэтому ответы
// совпадают с построенной поверхностью с точностью до тесселяции.

use std::sync::Arc;

use ultraviolet::Vec3;

use crate::gpu::terrain::bounds::Aabb;
use crate::gpu::terrain::generation::{self, DensityField};
use crate::gpu::terrain::manager::Chunk;
use crate::gpu::terrain::params::TerrainSettings;
use crate::gpu::terrain::road::RoadNetwork;

/// Минимальный и максимальный шаг зондирования
const MIN_PROBE_STEP: f32 = 0.25;
const MAX_PROBE_STEP: f32 = 16.0;
/// Дальше этого поверхность не ищем
const MAX_PROBE_DISTANCE: f32 = 8192.0;
const BISECTION_STEPS: u32 = 24;

/// Результат запроса к земле
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundQuery {
    /// Вертикальное расстояние до поверхности: > 0 над землёй, < 0 под ней
    pub distance: f32,
    pub found: bool,
    /// Нормаль поверхности в точке пересечения
    pub normal: Vec3,
}

impl GroundQuery {
    /// Ответ "нет данных" (чанк не загружен или поверхность не найдена)
    pub fn not_found() -> Self {
        Self { distance: 0.0, found: false, normal: Vec3::unit_y() }
    }
}

pub struct SpatialQueryService {
    settings: Arc<TerrainSettings>,
    roads: Arc<RoadNetwork>,
}

impl SpatialQueryService {
    pub fn new(settings: Arc<TerrainSettings>, roads: Arc<RoadNetwork>) -> Self {
        Self { settings, roads }
    }

    pub fn set_terrain(&mut self, settings: Arc<TerrainSettings>, roads: Arc<RoadNetwork>) {
        self.settings = settings;
        self.roads = roads;
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    /// Индексы сегментов, чьи коробки пересекают вертикальную колонку (x, z)
    fn column_segments(&self, x: f32, z: f32) -> Vec<u32> {
        let column = Aabb::new(
            Vec3::new(x, -MAX_PROBE_DISTANCE, z),
            Vec3::new(x, MAX_PROBE_DISTANCE, z),
        );
        self.roads.segments_overlapping(&column)
    }

    /// Плотность в точке с учётом дорог
    pub fn density(&self, pos: Vec3) -> f32 {
        let indices = self.column_segments(pos.x, pos.z);
        DensityField::new(&self.settings.params, self.roads.segments(), &indices).sample(pos)
    }

    /// Расстояние до земли по вертикали, с дорогами рядом с точкой
    pub fn query_ground(&self, pos: Vec3) -> GroundQuery {
        let indices = self.column_segments(pos.x, pos.z);
        self.query_ground_with(pos, &indices)
    }

    /// То же для заданного подмножества сегментов
    pub fn query_ground_with(&self, pos: Vec3, segment_indices: &[u32]) -> GroundQuery {
        let field = DensityField::new(&self.settings.params, self.roads.segments(), segment_indices);
        match ground_distance(&field, pos) {
            Some(distance) => {
                let hit = Vec3::new(pos.x, pos.y - distance, pos.z);
                GroundQuery { distance, found: true, normal: field.normal(hit) }
            }
            None => GroundQuery::not_found(),
        }
    }

    /// Запрос для коллизий: только сегменты загруженного чанка.
    /// Без чанка возвращается not_found (distance = 0, found = false).
    pub fn query_collision(&self, pos: Vec3, chunk: Option<&Chunk>) -> GroundQuery {
        match chunk {
            Some(chunk) => self.query_ground_with(pos, &chunk.segment_indices),
            None => GroundQuery::not_found(),
        }
    }

    /// Высота верхней поверхности в колонке (x, z)
    pub fn surface_height(&self, x: f32, z: f32) -> f32 {
        let top = self.settings.params.max_surface_height() + 1.0;
        let query = self.query_ground(Vec3::new(x, top, z));
        if query.found {
            top - query.distance
        } else {
            self.bedrock_height(x, z)
        }
    }

    /// Высота bedrock слоя (без фрактала и дорог)
    pub fn bedrock_height(&self, x: f32, z: f32) -> f32 {
        generation::bedrock_height(x, z, &self.settings.params)
    }

    /// Нормаль поля в произвольной точке
    pub fn normal(&self, pos: Vec3) -> Vec3 {
        let indices = self.column_segments(pos.x, pos.z);
        DensityField::new(&self.settings.params, self.roads.segments(), &indices).normal(pos)
    }

    /// Ниже уровня воды
    pub fn is_submerged(&self, pos: Vec3) -> bool {
        pos.y < self.settings.params.water_level
    }
}

/// Вертикальное расстояние до ближайшей поверхности: из воздуха вниз,
/// из земли вверх. Шаг зондирования следует за значением плотности,
/// точка пересечения уточняется бисекцией.
fn ground_distance(field: &DensityField, pos: Vec3) -> Option<f32> {
    let sample = |y: f32| field.sample(Vec3::new(pos.x, y, pos.z));

    let start = sample(pos.y);
    let direction = if start >= 0.0 { -1.0 } else { 1.0 };

    let mut y0 = pos.y;
    let mut d0 = start;
    let mut travelled = 0.0;
    while travelled < MAX_PROBE_DISTANCE {
        let step = (d0.abs() * 0.5).clamp(MIN_PROBE_STEP, MAX_PROBE_STEP);
        let y1 = y0 + direction * step;
        let d1 = sample(y1);
        if (d1 < 0.0) != (d0 < 0.0) {
            let surface = bisect(&sample, y0, d0, y1);
            return Some(pos.y - surface);
        }
        y0 = y1;
        d0 = d1;
        travelled += step;
    }
    None
}

fn bisect(sample: &impl Fn(f32) -> f32, mut a: f32, d_a: f32, mut b: f32) -> f32 {
    let inside_a = d_a < 0.0;
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (a + b);
        if (sample(mid) < 0.0) == inside_a {
            a = mid;
        } else {
            b = mid;
        }
    }
    0.5 * (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::terrain::params::TerrainParameters;
    use crate::gpu::terrain::road::RoadParams;

    fn flat_service(floor: f32, roads: RoadNetwork) -> SpatialQueryService {
        SpatialQueryService::new(
            Arc::new(TerrainSettings::new(TerrainParameters::flat(floor))),
            Arc::new(roads),
        )
    }

    #[test]
    fn test_distance_above_flat_ground() {
        let service = flat_service(5.0, RoadNetwork::empty());
        let query = service.query_ground(Vec3::new(1.0, 12.0, 1.0));
        assert!(query.found);
        assert!((query.distance - 7.0).abs() < 1e-3, "{}", query.distance);
        assert!((query.normal - Vec3::unit_y()).mag() < 1e-3);
    }

    #[test]
    fn test_distance_inside_ground_is_negative() {
        let service = flat_service(5.0, RoadNetwork::empty());
        let query = service.query_ground(Vec3::new(-3.0, 2.0, 40.0));
        assert!(query.found);
        assert!((query.distance + 3.0).abs() < 1e-3, "{}", query.distance);
    }

    #[test]
    fn test_surface_and_bedrock_height() {
        let service = flat_service(5.0, RoadNetwork::empty());
        assert!((service.surface_height(100.0, -20.0) - 5.0).abs() < 1e-3);
        assert_eq!(service.bedrock_height(100.0, -20.0), 5.0);
    }

    #[test]
    fn test_surface_follows_noise_terrain() {
        let service = SpatialQueryService::new(
            Arc::new(TerrainSettings::new(TerrainParameters::default())),
            Arc::new(RoadNetwork::empty()),
        );
        for (x, z) in [(10.0, 20.0), (-700.0, 333.0)] {
            let h = service.surface_height(x, z);
            assert!(service.density(Vec3::new(x, h + 0.5, z)) > 0.0);
            assert!(service.density(Vec3::new(x, h - 0.5, z)) < 0.0);
        }
    }

    #[test]
    fn test_road_lowers_surface() {
        let roads = RoadNetwork::generate(310, &RoadParams::default());
        let anchor = roads.spawn_anchor().unwrap();
        let radius = RoadParams::default().radius;
        let service = flat_service(50.0, roads);

        // Труба дороги (y = 0, радиус 60) прорезает пол на 50
        let on_road = service.surface_height(anchor.x, anchor.z);
        assert!(on_road < -radius + 1.0, "{}", on_road);
        let far_away = service.surface_height(5000.0, 5000.0);
        assert!((far_away - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_collision_without_chunk_is_sentinel() {
        let service = flat_service(5.0, RoadNetwork::empty());
        let query = service.query_collision(Vec3::new(0.0, 10.0, 0.0), None);
        assert_eq!(query, GroundQuery::not_found());
        assert!(!query.found);
        assert_eq!(query.distance, 0.0);
    }

    #[test]
    fn test_water_level() {
        let service = flat_service(5.0, RoadNetwork::empty());
        let water = service.settings().params.water_level;
        assert!(service.is_submerged(Vec3::new(0.0, water - 1.0, 0.0)));
        assert!(!service.is_submerged(Vec3::new(0.0, water + 1.0, 0.0)));
    }
}
