// ============================================
// World Config - Настройки мира из JSON
// ============================================
//
// Все поля имеют значения по умолчанию, поэтому JSON может быть частичным.
// Путь по умолчанию assets/world.json, переопределяется WORLD_CONFIG.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gpu::terrain::mesher::MAX_TESSELATION;
use crate::gpu::terrain::params::TerrainParameters;
use crate::gpu::terrain::road::RoadParams;

/// Файл конфигурации по умолчанию
pub const DEFAULT_CONFIG_PATH: &str = "assets/world.json";
/// Переменная окружения с путём к конфигурации
pub const CONFIG_ENV_VAR: &str = "WORLD_CONFIG";

/// Верхняя граница октав (каждая октава стоит сэмплов шума в каждой точке)
pub const MAX_OCTAVES: u32 = 16;

/// Бэкенд сборки чанков
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

/// Режим сборки чанков
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Сборка прямо в kick_chunk_loading, кадр ждёт её завершения
    #[default]
    Blocking,
    /// Сборка в фоновом потоке, результаты забирает poll_completed
    Background,
}

/// Настройки мира
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Размер чанка в мировых единицах (по всем трём осям)
    pub chunk_size: f32,
    /// Радиус загрузки в чанках (Чебышёв)
    pub render_distance: i32,
    /// Ячеек marching cubes на ребро чанка
    pub tesselation: u32,
    pub max_kicks_per_frame: usize,
    /// Мировая Y нижней грани каждого чанка
    pub base_height: f32,
    pub backend: Backend,
    pub build_mode: BuildMode,
    pub terrain: TerrainParameters,
    pub road: RoadParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256.0,
            render_distance: 8,
            tesselation: 32,
            max_kicks_per_frame: 1,
            base_height: -64.0,
            backend: Backend::Cpu,
            build_mode: BuildMode::Blocking,
            terrain: TerrainParameters::default(),
            road: RoadParams::default(),
        }
    }
}

/// Ошибки загрузки конфигурации
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Загрузить из WORLD_CONFIG или assets/world.json.
    /// Отсутствующий файл по умолчанию не ошибка, битый файл ошибка.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            log::info!("Loading world config from {}", path);
            return Self::load(path);
        }
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            log::info!("Loading world config from {}", DEFAULT_CONFIG_PATH);
            return Self::load(DEFAULT_CONFIG_PATH);
        }
        log::warn!("{} not found, using default world config", DEFAULT_CONFIG_PATH);
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tesselation == 0 {
            return Err(ConfigError::Invalid("tesselation must be at least 1".into()));
        }
        if self.tesselation > MAX_TESSELATION {
            return Err(ConfigError::Invalid(format!(
                "tesselation {} is above {}",
                self.tesselation, MAX_TESSELATION
            )));
        }
        if !(self.chunk_size > 0.0) {
            return Err(ConfigError::Invalid(format!("chunk_size {} must be positive", self.chunk_size)));
        }
        if self.render_distance < 0 {
            return Err(ConfigError::Invalid(format!("render_distance {} is negative", self.render_distance)));
        }
        if self.max_kicks_per_frame == 0 {
            return Err(ConfigError::Invalid("max_kicks_per_frame must be at least 1".into()));
        }
        if self.terrain.octaves > MAX_OCTAVES || self.terrain.warp_octaves > MAX_OCTAVES {
            return Err(ConfigError::Invalid(format!("octave count above {}", MAX_OCTAVES)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = WorldConfig::from_json("{}").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn test_partial_nested_json() {
        let config = WorldConfig::from_json(
            r#"{ "backend": "gpu", "build_mode": "background", "terrain": { "seed": 99 }, "road": { "radius": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Gpu);
        assert_eq!(config.build_mode, BuildMode::Background);
        assert_eq!(config.terrain.seed, 99);
        assert_eq!(config.terrain.octaves, TerrainParameters::default().octaves);
        assert_eq!(config.road.radius, 10.0);
        assert_eq!(config.road.point_count, RoadParams::default().point_count);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for json in [
            r#"{ "tesselation": 0 }"#,
            r#"{ "tesselation": 129 }"#,
            r#"{ "tesselation": 700 }"#,
            r#"{ "chunk_size": 0 }"#,
            r#"{ "max_kicks_per_frame": 0 }"#,
            r#"{ "terrain": { "octaves": 40 } }"#,
        ] {
            assert!(matches!(WorldConfig::from_json(json), Err(ConfigError::Invalid(_))), "{}", json);
        }
        assert!(matches!(WorldConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_tesselation_cap_is_inclusive() {
        let config = WorldConfig::from_json(r#"{ "tesselation": 128 }"#).unwrap();
        assert_eq!(config.tesselation, MAX_TESSELATION);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(WorldConfig::load("does/not/exist.json"), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = WorldConfig::from_json(include_str!("../../../assets/world.json")).unwrap();
        assert!(config.tesselation > 0);
    }
}
