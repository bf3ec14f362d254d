// ============================================
// Background Builder - Сборка чанков в фоновом потоке
// ============================================
//
// Запросы и результаты ходят через mpsc каналы. Поток живёт, пока жив
// отправитель запросов; Drop закрывает канал и дожидается потока.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::builder::ChunkBuilder;
use super::chunk::Chunk;
use crate::gpu::terrain::cache::ChunkId;
use crate::gpu::terrain::mesher::MesherError;
use crate::gpu::terrain::params::TerrainSettings;
use crate::gpu::terrain::road::RoadNetwork;

/// Запрос на сборку
pub(super) struct BuildJob {
    pub id: ChunkId,
    pub settings: Arc<TerrainSettings>,
    pub roads: Arc<RoadNetwork>,
}

/// Результат сборки
pub(super) struct BuildResult {
    pub id: ChunkId,
    /// Версия настроек, с которой был отправлен запрос
    pub version: u64,
    pub chunk: Result<Chunk, MesherError>,
}

pub(super) struct BackgroundBuilder {
    request_tx: Option<Sender<BuildJob>>,
    result_rx: Receiver<BuildResult>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundBuilder {
    pub fn new(builder: ChunkBuilder) -> Self {
        let (request_tx, request_rx) = channel::<BuildJob>();
        let (result_tx, result_rx) = channel::<BuildResult>();

        let worker = thread::Builder::new()
            .name("chunk-builder".into())
            .spawn(move || {
                while let Ok(job) = request_rx.recv() {
                    let chunk = builder.build(job.id, &job.settings, &job.roads);
                    let result = BuildResult { id: job.id, version: job.settings.version, chunk };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn chunk builder thread: {}", e);
                None
            }
        };

        Self { request_tx: Some(request_tx), result_rx, worker }
    }

    /// Отправить запрос. false, если поток уже завершился.
    pub fn submit(&self, job: BuildJob) -> bool {
        if self.worker.is_none() {
            return false;
        }
        self.request_tx.as_ref().is_some_and(|tx| tx.send(job).is_ok())
    }

    /// Забрать готовый результат без ожидания
    pub fn try_recv(&self) -> Option<BuildResult> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for BackgroundBuilder {
    fn drop(&mut self) {
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("chunk builder thread panicked");
            }
        }
    }
}
