// ============================================
// Density Field - Поле "расстояния до земли"
// ============================================
//
// Отрицательно внутри земли, положительно в воздухе, ноль на поверхности.
// Слои:
//   1. bedrock: floor_level + низкочастотный шум
//   2. фрактальная высота по позиции после domain warp
//   3. плавный min двух слоёв (ширина blend_factor)
//   4. вырезание туннеля дороги: max(d, -capsule)
//
// WGSL ядро (marching_cubes.wgsl) повторяет эти формулы один в один.

use ultraviolet::Vec3;

use super::noise::{snoise2d, snoise3d};
use crate::gpu::terrain::params::TerrainParameters;
use crate::gpu::terrain::road::TrackSegment;

/// Смещения сида для независимых слоёв шума
pub const FRACTAL_SEED_OFFSET: i32 = 1;
pub const WARP_SEED_OFFSET: i32 = 101;

/// Шаг центральной разности для нормалей
pub const GRADIENT_STEP: f32 = 0.5;

/// Полиномиальный smooth-min. При k <= 0 обычный min.
#[inline]
pub fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    b + (a - b) * h - k * h * (1.0 - h)
}

/// Высота bedrock слоя в колонке (x, z)
#[inline]
pub fn bedrock_height(x: f32, z: f32, params: &TerrainParameters) -> f32 {
    let f = params.bedrock_frequency;
    params.floor_level + params.bedrock_amplitude * snoise2d(x * f, z * f, params.seed)
}

/// Domain warp: позиция сдвигается многооктавным 3D шумом
#[inline]
pub fn warp(p: Vec3, params: &TerrainParameters) -> Vec3 {
    let mut q = p;
    let mut freq = params.warp_freq;
    let mut amp = params.warp_amp;
    for octave in 0..params.warp_octaves as i32 {
        let seed = params.seed
            .wrapping_add(WARP_SEED_OFFSET)
            .wrapping_add(octave.wrapping_mul(3));
        let s = q * freq;
        let offset = Vec3::new(
            snoise3d(s.x, s.y, s.z, seed),
            snoise3d(s.x, s.y, s.z, seed.wrapping_add(1)),
            snoise3d(s.x, s.y, s.z, seed.wrapping_add(2)),
        );
        q += offset * amp;
        freq *= params.warp_freq_mult;
        amp *= params.warp_amp_mult;
    }
    q
}

/// Фрактальная высота по уже искажённой позиции
#[inline]
pub fn fractal_height(q: Vec3, params: &TerrainParameters) -> f32 {
    let seed = params.seed.wrapping_add(FRACTAL_SEED_OFFSET);
    let mut freq = params.frequency;
    let mut amp = params.amplitude;
    let mut height = 0.0;
    for _ in 0..params.octaves {
        height += amp * snoise2d(q.x * freq, q.z * freq, seed);
        freq *= params.frequency_multiplier;
        amp *= params.amplitude_multiplier;
    }
    height
}

/// Плотность без дорог
#[inline]
pub fn terrain_density(p: Vec3, params: &TerrainParameters) -> f32 {
    let d_bedrock = p.y - bedrock_height(p.x, p.z, params);
    if params.octaves == 0 {
        return d_bedrock;
    }
    let d_fractal = p.y - fractal_height(warp(p, params), params);
    smooth_min(d_fractal, d_bedrock, params.blend_factor)
}

/// Поле плотности для одной сборки: параметры + подмножество сегментов дороги.
/// Сегмент участвует, только если его расширенный AABB содержит точку.
#[derive(Clone, Copy)]
pub struct DensityField<'a> {
    params: &'a TerrainParameters,
    segments: &'a [TrackSegment],
    indices: &'a [u32],
}

impl<'a> DensityField<'a> {
    pub fn new(params: &'a TerrainParameters, segments: &'a [TrackSegment], indices: &'a [u32]) -> Self {
        Self { params, segments, indices }
    }

    /// Поле без дорог
    pub fn terrain_only(params: &'a TerrainParameters) -> Self {
        Self { params, segments: &[], indices: &[] }
    }

    pub fn params(&self) -> &TerrainParameters {
        self.params
    }

    #[inline]
    pub fn sample(&self, p: Vec3) -> f32 {
        let mut density = terrain_density(p, self.params);
        for &index in self.indices {
            let Some(segment) = self.segments.get(index as usize) else {
                continue;
            };
            if segment.padded_aabb().contains(p) {
                density = density.max(-segment.capsule_distance(p));
            }
        }
        density
    }

    /// Градиент центральной разностью
    pub fn gradient(&self, p: Vec3, h: f32) -> Vec3 {
        let dx = Vec3::new(h, 0.0, 0.0);
        let dy = Vec3::new(0.0, h, 0.0);
        let dz = Vec3::new(0.0, 0.0, h);
        Vec3::new(
            self.sample(p + dx) - self.sample(p - dx),
            self.sample(p + dy) - self.sample(p - dy),
            self.sample(p + dz) - self.sample(p - dz),
        ) / (2.0 * h)
    }

    /// Нормаль поверхности (направлена в воздух). Вырожденный градиент даёт +Y.
    pub fn normal(&self, p: Vec3) -> Vec3 {
        let g = self.gradient(p, GRADIENT_STEP);
        let len = g.mag();
        if len > 1e-6 { g / len } else { Vec3::unit_y() }
    }
}
