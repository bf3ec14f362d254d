// ============================================
// Camera - Свободная камера наблюдателя
// ============================================
// Ориентация задаётся yaw/pitch. Позиция камеры служит точкой
// наблюдения для стриминга чанков и источником frustum для culling.

use ultraviolet::{Mat4, Vec3};

/// Ограничение pitch, чтобы forward не совпал с осью Y
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

pub struct Camera {
    pub position: Vec3,
    /// Поворот вокруг Y, радианы (0 = +X, PI/2 = +Z)
    pub yaw: f32,
    /// Наклон, радианы (+ вверх)
    pub pitch: f32,

    /// Параметры проекции
    pub aspect: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 50.0, 0.0),
            yaw: std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            aspect,
            fov: 70.0_f32.to_radians(),
            near: 0.1,
            far: 4000.0,
        }
    }

    /// Направление взгляда камеры
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
    }

    /// Вектор вправо
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::unit_y()).normalized()
    }

    /// Повернуть камеру на точку
    pub fn look_at(&mut self, target: Vec3) {
        let dir = target - self.position;
        let horizontal = (dir.x * dir.x + dir.z * dir.z).sqrt();
        if dir.mag_sq() <= f32::EPSILON {
            return;
        }
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.atan2(horizontal).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Повернуть на дельту (например, от мыши)
    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Матрица вида (View Matrix)
    pub fn view_matrix(&self) -> Mat4 {
        let target = self.position + self.forward();
        Mat4::look_at(self.position, target, Vec3::unit_y())
    }

    /// Матрица проекции (Perspective с Reversed-Z для лучшей точности вдали)
    pub fn projection_matrix(&self) -> Mat4 {
        // Reversed-Z: меняем near и far местами
        ultraviolet::projection::perspective_wgpu_dx(
            self.fov,
            self.aspect,
            self.far,
            self.near,
        )
    }

    /// Комбинированная матрица View-Projection
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_sets_forward() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(10.0, 5.0, 10.0);
        camera.look_at(Vec3::new(10.0, 5.0, -30.0));
        assert!((camera.forward() - Vec3::new(0.0, 0.0, -1.0)).mag() < 1e-5);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::new(1.0);
        camera.rotate(0.0, 10.0);
        assert!(camera.pitch <= MAX_PITCH);
        assert!(camera.forward().y < 1.0);
    }
}
