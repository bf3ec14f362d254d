// ============================================
// GPU Mesher - Marching cubes на compute шейдере
// ============================================
//
// Одна инвокация на ячейку, рабочая группа 4×4×4.
// Вершины остаются в storage буфере устройства, на хост читается только
// 16-байтный заголовок со счётчиком (блокирующий map_async + poll).

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{ChunkGeometry, ChunkMesher, MeshRequest, MesherError, HEADER_SIZE};
use crate::gpu::terrain::mesh::tables::{edge_table_u32, tri_table_i32};
use crate::gpu::terrain::mesh::TerrainVertex;
use crate::gpu::terrain::params::TerrainParameters;
use crate::gpu::terrain::road::GpuTrackSegment;

/// Ребро рабочей группы (должно совпадать с @workgroup_size в WGSL)
pub const WORKGROUP_EDGE: u32 = 4;

/// Uniform блок ядра (96 байт, раскладка WGSL uniform)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniforms {
    /// xyz = нижний угол чанка, w = размер ячейки
    pub origin_step: [f32; 4],
    pub tesselation: u32,
    pub capacity: u32,
    pub segment_count: u32,
    pub seed: i32,
    pub bedrock_frequency: f32,
    pub bedrock_amplitude: f32,
    pub frequency: f32,
    pub frequency_multiplier: f32,
    pub amplitude: f32,
    pub amplitude_multiplier: f32,
    pub floor_level: f32,
    pub blend_factor: f32,
    pub warp_freq: f32,
    pub warp_amp: f32,
    pub warp_freq_mult: f32,
    pub warp_amp_mult: f32,
    pub octaves: u32,
    pub warp_octaves: u32,
    pub _pad: [u32; 2],
}

impl MeshUniforms {
    pub fn new(request: &MeshRequest, params: &TerrainParameters, capacity: u32) -> Self {
        let origin = request.origin();
        Self {
            origin_step: [origin.x, origin.y, origin.z, request.step()],
            tesselation: request.tesselation,
            capacity,
            segment_count: request.segment_indices.len() as u32,
            seed: params.seed,
            bedrock_frequency: params.bedrock_frequency,
            bedrock_amplitude: params.bedrock_amplitude,
            frequency: params.frequency,
            frequency_multiplier: params.frequency_multiplier,
            amplitude: params.amplitude,
            amplitude_multiplier: params.amplitude_multiplier,
            floor_level: params.floor_level,
            blend_factor: params.blend_factor,
            warp_freq: params.warp_freq,
            warp_amp: params.warp_amp,
            warp_freq_mult: params.warp_freq_mult,
            warp_amp_mult: params.warp_amp_mult,
            octaves: params.octaves,
            warp_octaves: params.warp_octaves,
            _pad: [0; 2],
        }
    }
}

/// Число рабочих групп по каждой оси: ceil(T / 4)
pub fn dispatch_size(tesselation: u32) -> u32 {
    tesselation.div_ceil(WORKGROUP_EDGE)
}

/// Байтовый размер выходного буфера: заголовок + capacity вершин
pub fn output_buffer_size(capacity: u32) -> u64 {
    HEADER_SIZE + capacity as u64 * std::mem::size_of::<TerrainVertex>() as u64
}

/// Пустые storage массивы недопустимы, дополняем до одного элемента
fn padded<T: Copy + Default>(items: Vec<T>) -> Vec<T> {
    if items.is_empty() { vec![T::default()] } else { items }
}

pub struct GpuMesher {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    edge_table: wgpu::Buffer,
    tri_table: wgpu::Buffer,
}

impl GpuMesher {
    /// Headless устройство (без surface)
    pub fn new() -> Result<Self, MesherError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, MesherError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| MesherError::Device(e.to_string()))?;

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(MesherError::Device("adapter has no compute shader support".into()));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Terrain Mesher Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| MesherError::Device(e.to_string()))?;

        log::info!("gpu mesher on {:?}", adapter.get_info().name);
        Ok(Self::from_device(device, queue))
    }

    /// Использовать готовое устройство (например, рендерера)
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Marching Cubes Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("marching_cubes.wgsl").into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Marching Cubes Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, true),
                storage(4, true),
                storage(5, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Marching Cubes Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Marching Cubes Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let edge_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Edge Table"),
            contents: bytemuck::cast_slice(&edge_table_u32()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let tri_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Tri Table"),
            contents: bytemuck::cast_slice(&tri_table_i32()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        Self { device, queue, pipeline, bind_group_layout, edge_table, tri_table }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Прочитать счётчик вершин из заголовка. Блокирует до завершения GPU.
    fn read_count(&self, staging: &wgpu::Buffer) -> Result<u32, MesherError> {
        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        rx.recv()
            .map_err(|_| MesherError::Readback("map callback dropped".into()))??;

        let count = {
            let data = slice.get_mapped_range();
            bytemuck::pod_read_unaligned::<u32>(&data[..4])
        };
        staging.unmap();
        Ok(count)
    }
}

impl ChunkMesher for GpuMesher {
    fn label(&self) -> &'static str {
        "gpu"
    }

    fn build(&self, request: &MeshRequest) -> Result<ChunkGeometry, MesherError> {
        request.validate()?;

        let params = &request.settings.params;
        let capacity = request.capacity()?;
        let size = output_buffer_size(capacity);
        let max_binding = self.device.limits().max_storage_buffer_binding_size as u64;
        if size > max_binding {
            return Err(MesherError::InvalidRequest(format!(
                "output buffer of {} bytes exceeds the {} byte binding limit",
                size, max_binding
            )));
        }

        let uniforms = MeshUniforms::new(request, params, capacity);
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let segments = padded(request.roads.gpu_segments());
        let segment_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Track Segments"),
            contents: bytemuck::cast_slice::<GpuTrackSegment, u8>(&segments),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let indices = padded(request.segment_indices.to_vec());
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Chunk Segment Indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Vertices"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // Обнулить заголовок со счётчиком
        self.queue.write_buffer(&output, 0, bytemuck::cast_slice(&[0u32; 4]));

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Count Staging"),
            size: HEADER_SIZE,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Marching Cubes Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: self.edge_table.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: self.tri_table.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: segment_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: index_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: output.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Marching Cubes Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Marching Cubes Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = dispatch_size(request.tesselation);
            pass.dispatch_workgroups(groups, groups, groups);
        }
        encoder.copy_buffer_to_buffer(&output, 0, &staging, 0, HEADER_SIZE);
        self.queue.submit(Some(encoder.finish()));

        let raw_count = self.read_count(&staging)?;
        let overflowed = raw_count > capacity;
        let vertex_count = raw_count.min(capacity);
        if overflowed {
            log::warn!(
                "chunk ({}, {}) overflowed its vertex buffer: {} > {}",
                request.id.x, request.id.z, raw_count, capacity
            );
        }

        Ok(ChunkGeometry::Device { buffer: output, vertex_count, capacity, overflowed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::terrain::cache::ChunkId;
    use crate::gpu::terrain::params::TerrainSettings;
    use crate::gpu::terrain::road::RoadNetwork;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<MeshUniforms>(), 96);
        assert_eq!(std::mem::size_of::<GpuTrackSegment>(), 32);
    }

    #[test]
    fn test_dispatch_covers_every_cell() {
        assert_eq!(dispatch_size(32), 8);
        assert_eq!(dispatch_size(5), 2);
        assert_eq!(dispatch_size(1), 1);
    }

    #[test]
    fn test_uniforms_from_request() {
        let settings = TerrainSettings::new(TerrainParameters::default());
        let roads = RoadNetwork::empty();
        let request = MeshRequest {
            id: ChunkId::new(2, -1),
            chunk_size: 256.0,
            tesselation: 32,
            base_height: -64.0,
            settings: &settings,
            roads: &roads,
            segment_indices: &[3, 4],
        };
        let uniforms = MeshUniforms::new(&request, &settings.params, request.capacity().unwrap());
        assert_eq!(uniforms.origin_step, [512.0, -64.0, -256.0, 8.0]);
        assert_eq!(uniforms.capacity, 32 * 32 * 32 * 15);
        assert_eq!(uniforms.segment_count, 2);
        assert_eq!(output_buffer_size(uniforms.capacity), 16 + 32 * 32 * 32 * 15 * 32);
    }

    #[test]
    fn test_empty_arrays_are_padded() {
        assert_eq!(padded(Vec::<u32>::new()), vec![0]);
        assert_eq!(padded(vec![7u32, 8]), vec![7, 8]);
    }
}
