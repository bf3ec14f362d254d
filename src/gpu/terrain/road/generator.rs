// ============================================
// Road Network - Замкнутая трасса из капсул
// ============================================
//
// Детерминированный конвейер:
// 1) случайные 2D точки
// 2) выпуклая оболочка (monotone chain)
// 3) смещённые середины рёбер
// 4) прореживание близких точек (по кругу)
// 5) Catmull-Rom сэмплирование замкнутого контура
// 6) отрезок на каждую пару соседних сэмплов

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use ultraviolet::{Vec2, Vec3};

use crate::gpu::terrain::bounds::Aabb;
use crate::gpu::terrain::cache::ChunkId;
use super::segment::{GpuTrackSegment, TrackSegment};

/// Соль сида дорожной сети ("ROAD")
const ROAD_SALT: u64 = 0x524f_4144;

/// Минимум точек контура для сплайна
const MIN_SPLINE_POINTS: usize = 4;

/// Параметры генерации трассы
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadParams {
    pub point_count: u32,
    /// Разброс начальных точек от центра мира
    pub spread: f32,
    pub max_midpoint_displacement: f32,
    pub min_point_spacing: f32,
    pub radius: f32,
    /// Сэмплов на один пролёт сплайна
    pub spline_subdivisions: u32,
    /// Высота оси дороги
    pub height: f32,
}

impl Default for RoadParams {
    fn default() -> Self {
        Self {
            point_count: 8,
            spread: 1000.0,
            max_midpoint_displacement: 75.0,
            min_point_spacing: 150.0,
            radius: 60.0,
            spline_subdivisions: 20,
            height: 0.0,
        }
    }
}

/// Сгенерированная дорожная сеть
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    seed: i32,
    /// Замкнутый путь: последний сэмпл совпадает с первым
    path: Vec<Vec3>,
    segments: Vec<TrackSegment>,
}

impl RoadNetwork {
    /// Пустая сеть (дорог нет, вырезания нет)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Сгенерировать трассу для сида мира
    pub fn generate(seed: i32, params: &RoadParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64((seed as i64 as u64) ^ ROAD_SALT);
        let mut network = Self { seed, ..Default::default() };

        let points: Vec<Vec2> = (0..params.point_count)
            .map(|_| Vec2::new(signed_unit(&mut rng) * params.spread, signed_unit(&mut rng) * params.spread))
            .collect();

        let hull = convex_hull(points);
        if hull.len() < 3 {
            log::warn!("Road network: degenerate hull ({} points), no roads generated", hull.len());
            return network;
        }

        let roughened = displace_midpoints(&hull, params.max_midpoint_displacement, &mut rng);
        let contour = prune_close_points(roughened, params.min_point_spacing);

        let samples = if contour.len() < MIN_SPLINE_POINTS {
            log::warn!(
                "Road network: only {} control points after pruning, using contour edges without spline",
                contour.len()
            );
            if contour.is_empty() {
                return network;
            }
            contour
        } else {
            sample_closed_catmull_rom(&contour, params.spline_subdivisions.max(1))
        };

        let mut path: Vec<Vec3> = samples.iter()
            .map(|p| Vec3::new(p.x, params.height, p.y))
            .collect();
        path.push(path[0]);

        network.segments = path.windows(2)
            .map(|pair| TrackSegment::new(pair[0], pair[1], params.radius))
            .collect();
        network.path = path;

        log::info!(
            "Road network generated: seed {}, {} samples, {} segments",
            seed,
            network.sample_count(),
            network.segments.len()
        );
        network
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Замкнутый путь (первый сэмпл продублирован в конце)
    pub fn path(&self) -> &[Vec3] {
        &self.path
    }

    /// Число уникальных сэмплов пути
    pub fn sample_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Якорь спавна: начало первого отрезка
    pub fn spawn_anchor(&self) -> Option<Vec3> {
        self.segments.first().map(|s| s.start)
    }

    /// Индексы отрезков, чей AABB (+радиус) пересекает окрестность 3x3 чанка.
    /// Консервативный тест: лишние отрезки безопасны, пропущенные ломают вырезание.
    pub fn segments_for_chunk(&self, id: ChunkId, chunk_size: f32, base_height: f32) -> Vec<u32> {
        self.segments_overlapping(&id.neighborhood_aabb(chunk_size, base_height))
    }

    /// Индексы отрезков, чей AABB (+радиус) пересекает `bounds`
    pub fn segments_overlapping(&self, bounds: &Aabb) -> Vec<u32> {
        self.segments.iter()
            .enumerate()
            .filter(|(_, segment)| segment.padded_aabb().overlaps(bounds))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Данные для storage буфера
    pub fn gpu_segments(&self) -> Vec<GpuTrackSegment> {
        self.segments.iter().map(GpuTrackSegment::from).collect()
    }
}

#[inline]
fn signed_unit(rng: &mut ChaCha8Rng) -> f32 {
    rng.gen::<f32>() * 2.0 - 1.0
}

#[inline]
fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Выпуклая оболочка (Andrew's monotone chain), против часовой стрелки
fn convex_hull(mut points: Vec<Vec2>) -> Vec<Vec2> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut lower: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 1] - lower[lower.len() - 2], p - lower[lower.len() - 1]) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 1] - upper[upper.len() - 2], p - upper[upper.len() - 1]) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Вставляет середину каждого ребра со случайным смещением по перпендикуляру
fn displace_midpoints(hull: &[Vec2], max_displacement: f32, rng: &mut ChaCha8Rng) -> Vec<Vec2> {
    let n = hull.len();
    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let p0 = hull[i];
        let p1 = hull[(i + 1) % n];
        let dir = p1 - p0;
        let normal = Vec2::new(-dir.y, dir.x);
        let normal = if normal.mag_sq() > f32::EPSILON { normal.normalized() } else { Vec2::zero() };
        let mid = (p0 + p1) * 0.5 + normal * (signed_unit(rng) * max_displacement);
        out.push(p0);
        out.push(mid);
    }
    out
}

/// Удаляет точки ближе `min_spacing` к предыдущей оставленной; список замкнут
fn prune_close_points(points: Vec<Vec2>, min_spacing: f32) -> Vec<Vec2> {
    let mut cleaned: Vec<Vec2> = Vec::with_capacity(points.len());
    for p in points {
        match cleaned.last() {
            Some(&last) if (p - last).mag() < min_spacing => {}
            _ => cleaned.push(p),
        }
    }
    if cleaned.len() >= 2 && (cleaned[cleaned.len() - 1] - cleaned[0]).mag() < min_spacing {
        cleaned.pop();
    }
    cleaned
}

/// Uniform Catmull-Rom
#[inline]
fn catmull_rom(pm1: Vec2, p0: Vec2, p1: Vec2, p2: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    (p0 * 2.0
        + (p1 - pm1) * t
        + (pm1 * 2.0 - p0 * 5.0 + p1 * 4.0 - p2) * t2
        + (p0 * 3.0 - pm1 - p1 * 3.0 + p2) * t3)
        * 0.5
}

/// Сэмплы замкнутого контура: каждый пролёт даёт t в [0, 1), стыки не дублируются
fn sample_closed_catmull_rom(points: &[Vec2], subdivisions: u32) -> Vec<Vec2> {
    let n = points.len();
    let mut samples = Vec::with_capacity(n * subdivisions as usize);
    for i in 0..n {
        let pm1 = points[(i + n - 1) % n];
        let p0 = points[i];
        let p1 = points[(i + 1) % n];
        let p2 = points[(i + 2) % n];
        for s in 0..subdivisions {
            let t = s as f32 / subdivisions as f32;
            samples.push(catmull_rom(pm1, p0, p1, p2, t));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_closed_loop() {
        let network = RoadNetwork::generate(310, &RoadParams::default());
        assert!(!network.is_empty());
        let path = network.path();
        assert_eq!(path.first(), path.last());
        assert_eq!(network.segments().len(), network.sample_count());
        assert_eq!(network.segments().len(), path.len() - 1);
        // Отрезки идут встык
        for pair in network.segments().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(network.segments().last().map(|s| s.end), network.segments().first().map(|s| s.start));
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let a = RoadNetwork::generate(42, &RoadParams::default());
        let b = RoadNetwork::generate(42, &RoadParams::default());
        let c = RoadNetwork::generate(43, &RoadParams::default());
        assert_eq!(a.segments(), b.segments());
        assert_ne!(a.path(), c.path());
    }

    #[test]
    fn test_spline_samples_per_span() {
        let params = RoadParams::default();
        let network = RoadNetwork::generate(7, &params);
        if network.sample_count() >= MIN_SPLINE_POINTS * params.spline_subdivisions as usize {
            assert_eq!(network.sample_count() % params.spline_subdivisions as usize, 0);
        }
        assert!(network.segments().iter().all(|s| s.radius == params.radius));
        assert!(network.path().iter().all(|p| p.y == params.height));
    }

    #[test]
    fn test_convex_hull_drops_interior_points() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(5.0, 5.0),
            Vec2::new(2.0, 7.0),
        ];
        let hull = convex_hull(points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Vec2::new(5.0, 5.0)));
        // Обход против часовой стрелки
        for i in 0..hull.len() {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            let c = hull[(i + 2) % hull.len()];
            assert!(cross(b - a, c - b) > 0.0);
        }
    }

    #[test]
    fn test_prune_is_circular() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(100.0, 100.0),
            Vec2::new(0.5, 0.5),
        ];
        let cleaned = prune_close_points(points, 10.0);
        assert_eq!(cleaned, vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)]);
    }

    #[test]
    fn test_degenerate_contour_skips_spline() {
        // Шаг больше стороны квадрата разброса: после прореживания остаётся не больше 2 точек
        let params = RoadParams { min_point_spacing: 2500.0, ..Default::default() };
        let network = RoadNetwork::generate(310, &params);
        assert!(!network.is_empty());
        // Рёбра прореженного контура без сплайна
        assert!(network.sample_count() < MIN_SPLINE_POINTS);
        assert_eq!(network.path().first(), network.path().last());
        assert_eq!(network.segments().len(), network.sample_count());
    }

    #[test]
    fn test_too_few_points_yields_empty_network() {
        let params = RoadParams { point_count: 2, ..Default::default() };
        let network = RoadNetwork::generate(1, &params);
        assert!(network.is_empty());
        assert_eq!(network.spawn_anchor(), None);
    }

    #[test]
    fn test_chunk_filter_is_conservative() {
        let network = RoadNetwork::generate(310, &RoadParams::default());
        let chunk_size = 256.0;
        let base = -64.0;
        for x in -5..5 {
            for z in -5..5 {
                let id = ChunkId::new(x, z);
                let selected = network.segments_for_chunk(id, chunk_size, base);
                let chunk = id.aabb(chunk_size, base);
                // Любой отрезок, реально задевающий объём чанка, должен попасть в выборку
                for (i, segment) in network.segments().iter().enumerate() {
                    let on_axis = segment.closest_point(chunk.center());
                    if chunk.contains(on_axis) {
                        assert!(selected.contains(&(i as u32)), "segment {} missing for {:?}", i, id);
                    }
                }
            }
        }
    }

    #[test]
    fn test_spawn_anchor_is_first_segment_start() {
        let network = RoadNetwork::generate(310, &RoadParams::default());
        assert_eq!(network.spawn_anchor(), Some(network.path()[0]));
    }
}
