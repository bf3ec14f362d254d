// ============================================
// Chunk Output Buffer - Общий буфер вершин чанка
// ============================================
//
// Раскладка на устройстве: 16 байт заголовка { count: atomic<u32>, pad[3] },
// затем capacity вершин. На хосте заголовок заменяет AtomicU32 курсор.
//
// Запись идёт целыми треугольниками: каждый резерв кратен 3, ёмкость
// округлена вниз до кратного 3, поэтому первые min(count, capacity)
// вершин всегда полностью записаны. Память под вершины не обнуляется,
// длина выставляется в `finish` по значению курсора.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::gpu::terrain::mesh::tables::MAX_CELL_VERTICES;
use crate::gpu::terrain::mesh::TerrainVertex;

/// Размер заголовка буфера на устройстве в байтах
pub const HEADER_SIZE: u64 = 16;

/// Верхняя граница тесселяции (128³ · 15 вершин = 960 МБ на чанк)
pub const MAX_TESSELATION: u32 = 128;

/// Ёмкость буфера для T ячеек на ребро: T³ · 15. None, если не влезает в u32.
pub fn capacity_for(tesselation: u32) -> Option<u32> {
    tesselation
        .checked_mul(tesselation)?
        .checked_mul(tesselation)?
        .checked_mul(MAX_CELL_VERTICES as u32)
}

/// Буфер с append курсором, общий для всех потоков rayon
pub struct ChunkOutputBuffer {
    cursor: AtomicU32,
    capacity: u32,
    overflowed: AtomicBool,
    /// Выделено capacity слотов, len = 0 до `finish`
    storage: Vec<TerrainVertex>,
    /// Начало выделенной памяти storage
    base: *mut TerrainVertex,
}

// SAFETY: каждый поток пишет только в диапазон [start, start + n), полученный
// из fetch_add курсора, поэтому диапазоны разных потоков не пересекаются.
// storage не трогается до `finish`, который забирает буфер по значению.
unsafe impl Sync for ChunkOutputBuffer {}

impl ChunkOutputBuffer {
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity - capacity % 3;
        let mut storage = Vec::with_capacity(capacity as usize);
        let base = storage.as_mut_ptr();
        Self {
            cursor: AtomicU32::new(0),
            capacity,
            overflowed: AtomicBool::new(false),
            storage,
            base,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Добавить целые треугольники. Возвращает число записанных вершин.
    /// Всё, что не влезло, отбрасывается и помечается флагом overflowed.
    pub fn append(&self, triangles: &[TerrainVertex]) -> u32 {
        let n = (triangles.len() - triangles.len() % 3) as u32;
        if n == 0 {
            return 0;
        }
        let start = self.cursor.fetch_add(n, Ordering::AcqRel);
        let writable = n.min(self.capacity.saturating_sub(start));
        if writable < n {
            self.overflowed.store(true, Ordering::Relaxed);
        }
        if writable > 0 {
            // SAFETY: start + writable <= capacity, слоты зарезервированы только нами
            unsafe {
                std::ptr::copy_nonoverlapping(triangles.as_ptr(), self.base.add(start as usize), writable as usize);
            }
        }
        writable
    }

    /// Забрать записанные вершины. Вызывать после барьера завершения (join rayon).
    pub fn finish(self) -> (Vec<TerrainVertex>, bool) {
        let count = self.cursor.load(Ordering::Acquire).min(self.capacity) as usize;
        let overflowed = self.overflowed.load(Ordering::Relaxed);
        let mut vertices = self.storage;
        // SAFETY: резервы покрывают [0, count) без пропусков, и каждый слот
        // ниже capacity записан до барьера завершения
        unsafe {
            vertices.set_len(count);
        }
        (vertices, overflowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn tri(tag: f32) -> [TerrainVertex; 3] {
        let v = TerrainVertex { position: [tag, 0.0, 0.0, 1.0], normal: [0.0, 1.0, 0.0, 0.0] };
        [v, v, v]
    }

    #[test]
    fn test_capacity_formula() {
        assert_eq!(capacity_for(1), Some(15));
        assert_eq!(capacity_for(4), Some(64 * 15));
        assert_eq!(capacity_for(MAX_TESSELATION), Some(128 * 128 * 128 * 15));
        // 700³ · 15 = 5 145 000 000 > u32::MAX
        assert_eq!(capacity_for(700), None);
        assert_eq!(capacity_for(u32::MAX), None);
    }

    #[test]
    fn test_parallel_append_is_bounded() {
        let buffer = ChunkOutputBuffer::new(10);
        assert_eq!(buffer.capacity(), 9);

        (0..100).into_par_iter().for_each(|i| {
            buffer.append(&tri(i as f32));
        });

        let (vertices, overflowed) = buffer.finish();
        assert!(overflowed);
        assert_eq!(vertices.len(), 9);
        // Треугольники не рвутся: у каждой тройки один тег
        for triangle in vertices.chunks(3) {
            assert_eq!(triangle[0], triangle[1]);
            assert_eq!(triangle[1], triangle[2]);
        }
    }

    #[test]
    fn test_no_overflow_when_fits() {
        let buffer = ChunkOutputBuffer::new(capacity_for(1).unwrap());
        assert_eq!(buffer.append(&tri(1.0)), 3);
        assert_eq!(buffer.append(&[]), 0);
        let (vertices, overflowed) = buffer.finish();
        assert!(!overflowed);
        assert_eq!(vertices.len(), 3);
    }

    #[test]
    fn test_finish_returns_only_written_vertices() {
        let buffer = ChunkOutputBuffer::new(capacity_for(4).unwrap());
        let (vertices, overflowed) = buffer.finish();
        assert!(vertices.is_empty());
        assert!(!overflowed);

        let buffer = ChunkOutputBuffer::new(capacity_for(4).unwrap());
        (0..10).into_par_iter().for_each(|i| {
            buffer.append(&tri(i as f32));
        });
        let (vertices, _) = buffer.finish();
        let mut tags: Vec<u32> = vertices.chunks(3).map(|t| t[0].position[0] as u32).collect();
        tags.sort_unstable();
        assert_eq!(tags, (0..10).collect::<Vec<_>>());
    }
}
