use ultraviolet::{Mat4, Vec3};

use crate::gpu::terrain::bounds::Aabb;

/// Плоскость (nx, ny, nz, d): nx*x + ny*y + nz*z + d >= 0 означает "внутри"
pub type Plane = [f32; 4];

/// 6 нормализованных плоскостей пирамиды видимости
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

/// Извлекает 6 плоскостей frustum из view-projection матрицы (глубина 0..1, как в wgpu)
pub fn extract_frustum_planes(vp: &[[f32; 4]; 4]) -> [Plane; 6] {
    let m = vp;
    [
        // Left:   row3 + row0
        [m[0][3] + m[0][0], m[1][3] + m[1][0], m[2][3] + m[2][0], m[3][3] + m[3][0]],
        // Right:  row3 - row0
        [m[0][3] - m[0][0], m[1][3] - m[1][0], m[2][3] - m[2][0], m[3][3] - m[3][0]],
        // Bottom: row3 + row1
        [m[0][3] + m[0][1], m[1][3] + m[1][1], m[2][3] + m[2][1], m[3][3] + m[3][1]],
        // Top:    row3 - row1
        [m[0][3] - m[0][1], m[1][3] - m[1][1], m[2][3] - m[2][1], m[3][3] - m[3][1]],
        // z >= 0: row2
        [m[0][2], m[1][2], m[2][2], m[3][2]],
        // z <= w: row3 - row2
        [m[0][3] - m[0][2], m[1][3] - m[1][2], m[2][3] - m[2][2], m[3][3] - m[3][2]],
    ]
}

fn normalize_plane(plane: Plane) -> Plane {
    let len = (plane[0] * plane[0] + plane[1] * plane[1] + plane[2] * plane[2]).sqrt();
    if len > f32::EPSILON {
        [plane[0] / len, plane[1] / len, plane[2] / len, plane[3] / len]
    } else {
        plane
    }
}

/// Проверяет, находится ли AABB полностью снаружи плоскости frustum
fn is_aabb_outside_plane(plane: &Plane, min: Vec3, max: Vec3) -> bool {
    // Положительная вершина: угол, дальше всех по нормали плоскости
    let px = if plane[0] >= 0.0 { max.x } else { min.x };
    let py = if plane[1] >= 0.0 { max.y } else { min.y };
    let pz = if plane[2] >= 0.0 { max.z } else { min.z };

    plane[0] * px + plane[1] * py + plane[2] * pz + plane[3] < 0.0
}

impl Frustum {
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let m: [[f32; 4]; 4] = (*view_proj).into();
        Self { planes: extract_frustum_planes(&m).map(normalize_plane) }
    }

    /// Расстояние со знаком до каждой плоскости не отрицательно
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane[0] * p.x + plane[1] * p.y + plane[2] * p.z + plane[3] >= 0.0)
    }

    /// Консервативный тест: ложных отсечений нет, ложные попадания возможны у углов
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        !self.planes.iter().any(|plane| is_aabb_outside_plane(plane, aabb.min, aabb.max))
    }
}

/// Frustum culling: проверяет видимость AABB чанка.
/// Камера внутри чанка означает видимость без проверки плоскостей.
pub fn is_chunk_visible(aabb: &Aabb, frustum: &Frustum, camera_pos: Vec3) -> bool {
    if aabb.contains(camera_pos) {
        return true;
    }
    frustum.intersects_aabb(aabb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::player::Camera;

    fn camera_looking_along_z() -> Camera {
        let mut camera = Camera::new(16.0 / 9.0);
        camera.position = Vec3::zero();
        camera.look_at(Vec3::new(0.0, 0.0, 1.0));
        camera.far = 1000.0;
        camera
    }

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb::new(center - Vec3::broadcast(half), center + Vec3::broadcast(half))
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let camera = camera_looking_along_z();
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, 50.0)));
        assert!(is_chunk_visible(&cube(Vec3::new(0.0, 0.0, 100.0), 10.0), &frustum, camera.position));
    }

    #[test]
    fn test_box_behind_or_beyond_far_is_culled() {
        let camera = camera_looking_along_z();
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        assert!(!is_chunk_visible(&cube(Vec3::new(0.0, 0.0, -100.0), 10.0), &frustum, camera.position));
        assert!(!is_chunk_visible(&cube(Vec3::new(0.0, 0.0, 2000.0), 10.0), &frustum, camera.position));
        assert!(!is_chunk_visible(&cube(Vec3::new(500.0, 0.0, 10.0), 10.0), &frustum, camera.position));
    }

    #[test]
    fn test_camera_inside_box_is_visible() {
        let camera = camera_looking_along_z();
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        // Коробка в основном позади камеры, но камера внутри неё
        let around = Aabb::new(Vec3::new(-5.0, -5.0, -50.0), Vec3::new(5.0, 5.0, 0.05));
        assert!(is_chunk_visible(&around, &frustum, camera.position));
    }

    #[test]
    fn test_box_straddling_side_plane_is_visible() {
        let camera = camera_looking_along_z();
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        // Пересекает левую/правую границу, полностью внутри не лежит
        assert!(is_chunk_visible(&cube(Vec3::new(120.0, 0.0, 100.0), 40.0), &frustum, camera.position));
    }

    #[test]
    fn test_planes_are_normalized() {
        let camera = camera_looking_along_z();
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        for plane in frustum.planes {
            let len = (plane[0] * plane[0] + plane[1] * plane[1] + plane[2] * plane[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }
}
