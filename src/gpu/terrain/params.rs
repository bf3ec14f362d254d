// ============================================
// Terrain Parameters - Параметры поля плотности
// ============================================
//
// Параметры неизменны во время сборки чанка. Любое изменение создаёт
// новую версию настроек и требует полной перезагрузки всех чанков.

use serde::{Deserialize, Serialize};

/// Настраиваемые параметры террейна
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParameters {
    /// Частота слоя bedrock (низкочастотный "пол")
    pub bedrock_frequency: f32,
    /// Амплитуда слоя bedrock
    pub bedrock_amplitude: f32,
    /// Базовая частота фрактального слоя
    pub frequency: f32,
    /// Множитель частоты между октавами (lacunarity)
    pub frequency_multiplier: f32,
    /// Базовая амплитуда фрактального слоя
    pub amplitude: f32,
    /// Множитель амплитуды между октавами (gain)
    pub amplitude_multiplier: f32,
    /// Количество октав фрактального слоя
    pub octaves: u32,
    /// Уровень пола
    pub floor_level: f32,
    /// Ширина плавного смешивания bedrock и фрактального слоя
    pub blend_factor: f32,
    pub warp_freq: f32,
    pub warp_amp: f32,
    pub warp_freq_mult: f32,
    pub warp_amp_mult: f32,
    pub warp_octaves: u32,
    /// Сид мира (шум, дорожная сеть)
    pub seed: i32,
    /// Уровень воды (используется внешними потребителями)
    pub water_level: f32,
}

impl Default for TerrainParameters {
    fn default() -> Self {
        Self {
            bedrock_frequency: 0.003,
            bedrock_amplitude: 16.0,
            frequency: 0.0016,
            frequency_multiplier: 2.0,
            amplitude: 180.0,
            amplitude_multiplier: 0.45,
            octaves: 6,
            floor_level: 25.0,
            blend_factor: 24.0,
            warp_freq: 0.001,
            warp_amp: 12.0,
            warp_freq_mult: 2.0,
            warp_amp_mult: 0.5,
            warp_octaves: 6,
            seed: 310,
            water_level: 16.0,
        }
    }
}

impl TerrainParameters {
    /// Плоская земля на уровне `floor_level` (без шума и warp)
    pub fn flat(floor_level: f32) -> Self {
        Self {
            bedrock_amplitude: 0.0,
            amplitude: 0.0,
            octaves: 0,
            blend_factor: 0.0,
            warp_amp: 0.0,
            warp_octaves: 0,
            floor_level,
            ..Default::default()
        }
    }

    /// Верхняя граница высоты поверхности (для зондирования сверху вниз)
    pub fn max_surface_height(&self) -> f32 {
        let mut amp = self.amplitude.abs();
        let mut total = 0.0;
        for _ in 0..self.octaves {
            total += amp;
            amp *= self.amplitude_multiplier.abs();
        }
        let mut warp = self.warp_amp.abs();
        let mut warp_total = 0.0;
        for _ in 0..self.warp_octaves {
            warp_total += warp;
            warp *= self.warp_amp_mult.abs();
        }
        (self.floor_level + self.bedrock_amplitude.abs()).max(total) + warp_total + self.blend_factor.abs()
    }
}

/// Версионированные настройки террейна.
/// Чанк всегда строится одной версией целиком.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainSettings {
    pub version: u64,
    pub params: TerrainParameters,
}

impl TerrainSettings {
    pub fn new(params: TerrainParameters) -> Self {
        Self { version: 0, params }
    }

    /// Следующая версия с новыми параметрами
    pub fn next(&self, params: TerrainParameters) -> Self {
        Self { version: self.version + 1, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_version_increments() {
        let settings = TerrainSettings::new(TerrainParameters::default());
        let next = settings.next(TerrainParameters::flat(10.0));
        assert_eq!(next.version, settings.version + 1);
        assert_eq!(next.params.floor_level, 10.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: TerrainParameters = serde_json::from_str(r#"{ "seed": 7, "octaves": 3 }"#).unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.octaves, 3);
        assert_eq!(params.amplitude, TerrainParameters::default().amplitude);
    }

    #[test]
    fn test_max_surface_height_covers_flat_floor() {
        let flat = TerrainParameters::flat(12.0);
        assert!(flat.max_surface_height() >= 12.0);
    }
}
