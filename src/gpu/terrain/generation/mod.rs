pub mod noise;
pub mod density;

pub use density::{bedrock_height, terrain_density, DensityField};
pub use noise::{hash3d, noise2d, noise3d};
