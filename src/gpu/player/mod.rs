// ============================================
// Player Module - Камера и пролёт наблюдателя
// ============================================

mod camera;
mod flight;

pub use camera::*;
pub use flight::*;
