// ============================================
// AABB - Ограничивающие коробки
// ============================================

use ultraviolet::Vec3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Коробка, охватывающая две точки
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min_by_component(b),
            max: a.max_by_component(b),
        }
    }

    /// Расширить во все стороны на `amount`
    pub fn expanded(&self, amount: f32) -> Self {
        let pad = Vec3::broadcast(amount);
        Self { min: self.min - pad, max: self.max + pad }
    }

    /// Объединение двух коробок
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// Пересечение с касанием включительно
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
            && self.min.y <= other.max.y && self.max.y >= other.min.y
            && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x
            && p.y >= self.min.y && p.y <= self.max.y
            && p.z >= self.min.z && p.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_includes_touching_faces() {
        let a = Aabb::new(Vec3::zero(), Vec3::one());
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Vec3::new(1.5, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.expanded(0.5).overlaps(&c));
    }

    #[test]
    fn test_from_points_orders_corners() {
        let aabb = Aabb::from_points(Vec3::new(5.0, -1.0, 2.0), Vec3::new(-3.0, 4.0, 2.0));
        assert_eq!(aabb.min, Vec3::new(-3.0, -1.0, 2.0));
        assert_eq!(aabb.max, Vec3::new(5.0, 4.0, 2.0));
        assert!(aabb.contains(Vec3::new(0.0, 0.0, 2.0)));
    }
}
