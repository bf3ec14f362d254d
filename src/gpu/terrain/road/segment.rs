// ============================================
// Track Segment - Капсула дорожного полотна
// ============================================

use bytemuck::{Pod, Zeroable};
use ultraviolet::Vec3;

use crate::gpu::terrain::bounds::Aabb;

/// Отрезок дороги: линия между start и end, утолщённая на radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

impl TrackSegment {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        Self { start, end, radius }
    }

    /// AABB отрезка, расширенный на радиус
    pub fn padded_aabb(&self) -> Aabb {
        Aabb::from_points(self.start, self.end).expanded(self.radius)
    }

    /// Ближайшая точка отрезка к `p`
    #[inline]
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let ab = self.end - self.start;
        let len_sq = ab.mag_sq();
        if len_sq <= f32::EPSILON {
            return self.start;
        }
        let t = ((p - self.start).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.start + ab * t
    }

    /// SDF капсулы: < 0 внутри трубы
    #[inline]
    pub fn capsule_distance(&self, p: Vec3) -> f32 {
        (p - self.closest_point(p)).mag() - self.radius
    }

    pub fn length(&self) -> f32 {
        (self.end - self.start).mag()
    }
}

/// Раскладка отрезка для storage буфера (std430)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, Default)]
pub struct GpuTrackSegment {
    /// a.x, a.y, a.z, radius
    pub start_r: [f32; 4],
    /// b.x, b.y, b.z, 0
    pub end_pad: [f32; 4],
}

impl From<&TrackSegment> for GpuTrackSegment {
    fn from(segment: &TrackSegment) -> Self {
        Self {
            start_r: [segment.start.x, segment.start.y, segment.start.z, segment.radius],
            end_pad: [segment.end.x, segment.end.y, segment.end.z, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_distance() {
        let seg = TrackSegment::new(Vec3::zero(), Vec3::new(10.0, 0.0, 0.0), 2.0);
        assert!((seg.capsule_distance(Vec3::new(5.0, 0.0, 0.0)) + 2.0).abs() < 1e-5);
        assert!((seg.capsule_distance(Vec3::new(5.0, 3.0, 0.0)) - 1.0).abs() < 1e-5);
        // За концом отрезка расстояние считается до торца
        assert!((seg.capsule_distance(Vec3::new(13.0, 0.0, 4.0)) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_padded_aabb_contains_capsule() {
        let seg = TrackSegment::new(Vec3::new(1.0, 0.0, 1.0), Vec3::new(-4.0, 0.0, 6.0), 3.0);
        let aabb = seg.padded_aabb();
        assert_eq!(aabb.min, Vec3::new(-7.0, -3.0, -2.0));
        assert_eq!(aabb.max, Vec3::new(4.0, 3.0, 9.0));
    }
}
