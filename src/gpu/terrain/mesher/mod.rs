// ============================================
// Chunk Mesher - Сборка геометрии чанка
// ============================================
//
// Один интерфейс, два бэкенда:
// - CpuMesher: rayon, вершины остаются на хосте
// - GpuMesher: wgpu compute, вершины остаются на устройстве
//
// Оба бэкенда выдают одинаковый набор треугольников (порядок может
// отличаться) и никогда не пишут больше capacity вершин.

mod buffer;
mod cpu;
mod gpu;

pub use buffer::{capacity_for, ChunkOutputBuffer, HEADER_SIZE, MAX_TESSELATION};
pub use cpu::CpuMesher;
pub use gpu::GpuMesher;

use std::fmt;

use ultraviolet::Vec3;

use crate::gpu::terrain::cache::ChunkId;
use crate::gpu::terrain::mesh::TerrainVertex;
use crate::gpu::terrain::params::TerrainSettings;
use crate::gpu::terrain::road::RoadNetwork;

/// Всё, что нужно для сборки одного чанка
#[derive(Clone, Copy)]
pub struct MeshRequest<'a> {
    pub id: ChunkId,
    pub chunk_size: f32,
    /// Ячеек на ребро чанка (T)
    pub tesselation: u32,
    pub base_height: f32,
    pub settings: &'a TerrainSettings,
    pub roads: &'a RoadNetwork,
    /// Индексы сегментов, пересекающих окрестность чанка
    pub segment_indices: &'a [u32],
}

impl MeshRequest<'_> {
    /// Нижний угол чанка в мировых координатах
    pub fn origin(&self) -> Vec3 {
        self.id.origin(self.chunk_size, self.base_height)
    }

    /// Размер ячейки
    pub fn step(&self) -> f32 {
        self.chunk_size / self.tesselation as f32
    }

    /// Максимум вершин: T³ · 15
    pub fn capacity(&self) -> Result<u32, MesherError> {
        capacity_for(self.tesselation).ok_or_else(|| {
            MesherError::InvalidRequest(format!("tesselation {} overflows the vertex capacity", self.tesselation))
        })
    }

    pub fn validate(&self) -> Result<(), MesherError> {
        if self.tesselation == 0 {
            return Err(MesherError::InvalidRequest("tesselation must be at least 1".into()));
        }
        if self.tesselation > MAX_TESSELATION {
            return Err(MesherError::InvalidRequest(format!(
                "tesselation {} is above {}",
                self.tesselation, MAX_TESSELATION
            )));
        }
        if !(self.chunk_size > 0.0) {
            return Err(MesherError::InvalidRequest(format!("chunk size {} must be positive", self.chunk_size)));
        }
        Ok(())
    }
}

/// Результат сборки чанка
pub enum ChunkGeometry {
    /// Вершины в памяти хоста (CPU бэкенд)
    Host {
        vertices: Vec<TerrainVertex>,
        overflowed: bool,
    },
    /// Вершины в storage буфере устройства (GPU бэкенд).
    /// Буфер начинается с HEADER_SIZE байт заголовка со счётчиком.
    Device {
        buffer: wgpu::Buffer,
        vertex_count: u32,
        capacity: u32,
        overflowed: bool,
    },
}

impl ChunkGeometry {
    pub fn empty() -> Self {
        ChunkGeometry::Host { vertices: Vec::new(), overflowed: false }
    }

    /// Количество вершин для отрисовки (всегда кратно 3 и не больше capacity)
    pub fn vertex_count(&self) -> u32 {
        match self {
            ChunkGeometry::Host { vertices, .. } => vertices.len() as u32,
            ChunkGeometry::Device { vertex_count, .. } => *vertex_count,
        }
    }

    pub fn overflowed(&self) -> bool {
        match self {
            ChunkGeometry::Host { overflowed, .. } | ChunkGeometry::Device { overflowed, .. } => *overflowed,
        }
    }

    /// Вершины на хосте, если они там есть
    pub fn host_vertices(&self) -> Option<&[TerrainVertex]> {
        match self {
            ChunkGeometry::Host { vertices, .. } => Some(vertices),
            ChunkGeometry::Device { .. } => None,
        }
    }

    /// Вершинный буфер и смещение первой вершины (для set_vertex_buffer)
    pub fn device_buffer(&self) -> Option<(&wgpu::Buffer, u64)> {
        match self {
            ChunkGeometry::Device { buffer, .. } => Some((buffer, HEADER_SIZE)),
            ChunkGeometry::Host { .. } => None,
        }
    }
}

impl fmt::Debug for ChunkGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkGeometry::Host { vertices, overflowed } => f
                .debug_struct("Host")
                .field("vertices", &vertices.len())
                .field("overflowed", overflowed)
                .finish(),
            ChunkGeometry::Device { vertex_count, capacity, overflowed, .. } => f
                .debug_struct("Device")
                .field("vertex_count", vertex_count)
                .field("capacity", capacity)
                .field("overflowed", overflowed)
                .finish(),
        }
    }
}

/// Ошибки сборки. Переполнение буфера ошибкой не считается.
#[derive(Debug)]
pub enum MesherError {
    /// Нет адаптера или устройства
    Device(String),
    /// Не удалось прочитать счётчик вершин
    Readback(String),
    InvalidRequest(String),
}

impl fmt::Display for MesherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MesherError::Device(msg) => write!(f, "gpu device unavailable: {}", msg),
            MesherError::Readback(msg) => write!(f, "vertex count readback failed: {}", msg),
            MesherError::InvalidRequest(msg) => write!(f, "invalid mesh request: {}", msg),
        }
    }
}

impl std::error::Error for MesherError {}

impl From<wgpu::BufferAsyncError> for MesherError {
    fn from(e: wgpu::BufferAsyncError) -> Self {
        MesherError::Readback(e.to_string())
    }
}

impl From<wgpu::PollError> for MesherError {
    fn from(e: wgpu::PollError) -> Self {
        MesherError::Readback(e.to_string())
    }
}

/// Бэкенд сборки чанков
pub trait ChunkMesher: Send + Sync {
    fn label(&self) -> &'static str;

    /// Собрать геометрию чанка. Блокирует до готовности счётчика вершин.
    fn build(&self, request: &MeshRequest) -> Result<ChunkGeometry, MesherError>;
}

/// Плоская нормаль треугольника, направленная в воздух (обход таблиц
/// идёт по часовой стрелке, если смотреть снаружи).
/// Вырожденный треугольник получает +Y.
#[inline]
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let n = (c - a).cross(b - a);
    let len = n.mag();
    if len > 1e-12 { n / len } else { Vec3::unit_y() }
}

/// Точка пересечения ребра с поверхностью. При почти равных значениях
/// возвращается первая вершина ребра.
#[inline]
pub fn interpolate_edge(p1: Vec3, p2: Vec3, v1: f32, v2: f32) -> Vec3 {
    const EPS: f32 = 1e-5;
    if v1.abs() < EPS || (v1 - v2).abs() < EPS {
        return p1;
    }
    if v2.abs() < EPS {
        return p2;
    }
    let t = -v1 / (v2 - v1);
    p1 + (p2 - p1) * t
}
