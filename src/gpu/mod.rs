// ============================================
// GPU Module - Бесконечный terrain на marching cubes
// ============================================

pub mod core;
pub mod player;
pub mod render;
pub mod terrain;

pub use core::app::run;
