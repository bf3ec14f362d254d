// ============================================
// CPU Mesher - Marching cubes на rayon
// ============================================
//
// Фаза 1: плотность в узлах решётки (T+1)³, параллельно.
// Фаза 2: каждая ячейка T³ независимо, треугольники пишутся через
//         общий атомарный курсор ChunkOutputBuffer.
// Завершение for_each rayon служит барьером перед чтением курсора.

use ndshape::{RuntimeShape, Shape};
use rayon::prelude::*;
use ultraviolet::Vec3;

use super::{face_normal, interpolate_edge, ChunkGeometry, ChunkMesher, ChunkOutputBuffer, MeshRequest, MesherError};
use crate::gpu::terrain::generation::DensityField;
use crate::gpu::terrain::mesh::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, MAX_CELL_VERTICES, TRI_END, TRI_TABLE};
use crate::gpu::terrain::mesh::TerrainVertex;

pub struct CpuMesher {
    /// Принудительная ёмкость буфера (для проверки переполнения)
    capacity_override: Option<u32>,
}

impl CpuMesher {
    pub fn new() -> Self {
        Self { capacity_override: None }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self { capacity_override: Some(capacity) }
    }
}

impl Default for CpuMesher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkMesher for CpuMesher {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn build(&self, request: &MeshRequest) -> Result<ChunkGeometry, MesherError> {
        request.validate()?;

        let t = request.tesselation;
        let origin = request.origin();
        let step = request.step();
        let field = DensityField::new(
            &request.settings.params,
            request.roads.segments(),
            request.segment_indices,
        );

        // Фаза 1: решётка плотности
        let lattice = RuntimeShape::<u32, 3>::new([t + 1, t + 1, t + 1]);
        let samples: Vec<f32> = (0..lattice.size())
            .into_par_iter()
            .map(|i| {
                let [x, y, z] = lattice.delinearize(i);
                field.sample(origin + Vec3::new(x as f32, y as f32, z as f32) * step)
            })
            .collect();

        // Фаза 2: ячейки
        let capacity = match self.capacity_override {
            Some(capacity) => capacity,
            None => request.capacity()?,
        };
        let output = ChunkOutputBuffer::new(capacity);
        let cells = RuntimeShape::<u32, 3>::new([t, t, t]);

        (0..cells.size()).into_par_iter().for_each(|i| {
            let cell = cells.delinearize(i);
            let mut corners = [Vec3::zero(); 8];
            let mut values = [0.0f32; 8];
            for (c, offset) in CORNER_OFFSETS.iter().enumerate() {
                let node = [cell[0] + offset[0], cell[1] + offset[1], cell[2] + offset[2]];
                corners[c] = origin + Vec3::new(node[0] as f32, node[1] as f32, node[2] as f32) * step;
                values[c] = samples[lattice.linearize(node) as usize];
            }

            let mut triangles = [TerrainVertex::default(); MAX_CELL_VERTICES];
            let n = march_cell(&corners, &values, &mut triangles);
            if n > 0 {
                output.append(&triangles[..n]);
            }
        });

        let (vertices, overflowed) = output.finish();
        if overflowed {
            log::warn!(
                "chunk ({}, {}) overflowed its vertex buffer, clamped to {} vertices",
                request.id.x, request.id.z, vertices.len()
            );
        }

        Ok(ChunkGeometry::Host { vertices, overflowed })
    }
}

/// Треугольники одной ячейки. Бит n индекса конфигурации выставлен,
/// когда values[n] < 0 (угол внутри земли). Возвращает число вершин.
pub fn march_cell(corners: &[Vec3; 8], values: &[f32; 8], out: &mut [TerrainVertex; MAX_CELL_VERTICES]) -> usize {
    let case = values
        .iter()
        .enumerate()
        .fold(0usize, |case, (i, &v)| if v < 0.0 { case | (1 << i) } else { case });

    let mask = EDGE_TABLE[case];
    if mask == 0 {
        return 0;
    }

    let mut edge_points = [Vec3::zero(); 12];
    for (edge, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
        if mask & (1 << edge) != 0 {
            edge_points[edge] = interpolate_edge(corners[a], corners[b], values[a], values[b]);
        }
    }

    let mut count = 0;
    for tri in TRI_TABLE[case].chunks_exact(3) {
        if tri[0] == TRI_END {
            break;
        }
        let a = edge_points[tri[0] as usize];
        let b = edge_points[tri[1] as usize];
        let c = edge_points[tri[2] as usize];
        let normal = face_normal(a, b, c);
        out[count] = TerrainVertex::new(a, normal);
        out[count + 1] = TerrainVertex::new(b, normal);
        out[count + 2] = TerrainVertex::new(c, normal);
        count += 3;
    }
    count
}
