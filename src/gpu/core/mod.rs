// ============================================
// Core Module - Конфигурация и запуск
// ============================================

pub mod app;
pub mod config;

pub use app::App;
pub use config::{Backend, BuildMode, ConfigError, WorldConfig};
