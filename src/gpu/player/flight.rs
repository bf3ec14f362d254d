// ============================================
// Flight Path - Автоматический пролёт по трассе
// ============================================
// Камера движется по замкнутой ломаной с постоянной скоростью.
// Без трассы летим по прямой вдоль +X.

use ultraviolet::Vec3;

pub struct FlightPath {
    points: Vec<Vec3>,
    /// cumulative[i] = длина пути от points[0] до points[i]
    cumulative: Vec<f32>,
    /// Скорость полёта, единиц в секунду
    pub speed: f32,
    /// Пройденное расстояние
    travelled: f32,
}

impl FlightPath {
    pub fn new(points: &[Vec3], speed: f32) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                total += (*p - points[i - 1]).mag();
            }
            cumulative.push(total);
        }
        Self { points: points.to_vec(), cumulative, speed, travelled: 0.0 }
    }

    /// Полная длина пути
    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Продвинуться на dt секунд
    pub fn advance(&mut self, dt: f32) {
        self.travelled += self.speed * dt;
        let length = self.length();
        if length > 0.0 {
            self.travelled %= length;
        }
    }

    pub fn travelled(&self) -> f32 {
        self.travelled
    }

    /// Позиция и направление на текущем расстоянии
    pub fn sample(&self) -> (Vec3, Vec3) {
        self.sample_at(self.travelled)
    }

    pub fn sample_at(&self, distance: f32) -> (Vec3, Vec3) {
        if self.points.len() < 2 || self.length() <= 0.0 {
            let origin = self.points.first().copied().unwrap_or_else(Vec3::zero);
            return (origin + Vec3::unit_x() * distance, Vec3::unit_x());
        }

        let d = distance.rem_euclid(self.length());
        // Первый индекс с cumulative > d
        let next = self.cumulative.partition_point(|&c| c <= d).clamp(1, self.points.len() - 1);
        let (a, b) = (self.points[next - 1], self.points[next]);
        let span = self.cumulative[next] - self.cumulative[next - 1];
        let t = if span > 0.0 { (d - self.cumulative[next - 1]) / span } else { 0.0 };

        let dir = b - a;
        let dir = if dir.mag_sq() > 0.0 { dir.normalized() } else { Vec3::unit_x() };
        (a + (b - a) * t, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> FlightPath {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        FlightPath::new(&points, 5.0)
    }

    #[test]
    fn test_sample_along_loop() {
        let path = square();
        assert_eq!(path.length(), 40.0);
        let (p, dir) = path.sample_at(15.0);
        assert!((p - Vec3::new(10.0, 0.0, 5.0)).mag() < 1e-5);
        assert!((dir - Vec3::unit_z()).mag() < 1e-5);
    }

    #[test]
    fn test_advance_wraps() {
        let mut path = square();
        path.advance(9.0);
        assert!((path.travelled() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_path_flies_straight() {
        let mut path = FlightPath::new(&[], 2.0);
        path.advance(3.0);
        let (p, dir) = path.sample();
        assert_eq!(p, Vec3::new(6.0, 0.0, 0.0));
        assert_eq!(dir, Vec3::unit_x());
    }
}
