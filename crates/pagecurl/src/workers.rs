//! Fixed set of background threads that decode full-resolution pages.
//!
//! Jobs go in on one channel and decoded pages come back on another; only the
//! thread that owns the [`TexturePool`](crate::texture_pool::TexturePool) reads the
//! results. Dropping the workers discards queued jobs, lets in-flight decodes
//! finish and joins every thread.

use crate::raster::RasterImage;
use crate::texture_pool::{PageDecoder, PageProvider};
use crossbeam_channel::{Receiver, Sender};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const DEFAULT_DECODE_WORKERS: usize = 2;

pub(crate) struct DecodeJob {
    pub generation: u64,
    pub page: usize,
    pub provider: Arc<dyn PageProvider>,
}

/// A full-resolution page, or the error placeholder if decoding failed.
#[derive(Debug)]
pub struct DecodedPage {
    pub generation: u64,
    pub page: usize,
    pub image: RasterImage,
}

pub struct DecodeWorkers {
    jobs: Option<Sender<DecodeJob>>,
    queued: Receiver<DecodeJob>,
    results: Receiver<DecodedPage>,
    #[cfg_attr(not(test), allow(dead_code))]
    results_tx: Sender<DecodedPage>,
    handles: Vec<JoinHandle<()>>,
}

impl DecodeWorkers {
    /// Starts `count` decode threads (at least one).
    pub fn new(count: usize) -> io::Result<Self> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();
        let (results_tx, results_rx) = crossbeam_channel::unbounded();

        let mut handles = Vec::with_capacity(count.max(1));
        for i in 0..count.max(1) {
            let jobs = jobs_rx.clone();
            let results = results_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("page-decode-{}", i))
                .spawn(move || worker_loop(jobs, results))?;
            handles.push(handle);
        }
        log::info!("started {} page decode workers", handles.len());

        Ok(Self {
            jobs: Some(jobs_tx),
            queued: jobs_rx,
            results: results_rx,
            results_tx,
            handles,
        })
    }

    /// Channels with no thread attached: jobs just queue up.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        Self {
            jobs: Some(jobs_tx),
            queued: jobs_rx,
            results: results_rx,
            results_tx,
            handles: Vec::new(),
        }
    }

    /// Jobs not yet picked up by a thread.
    pub fn queued_jobs(&self) -> usize {
        self.queued.len()
    }

    pub(crate) fn submit(&self, job: DecodeJob) {
        if let Some(jobs) = &self.jobs {
            // The receiving half lives in `self`, so the channel is never disconnected here.
            let _ = jobs.send(job);
        }
    }

    /// Results that arrived since the last call, without blocking.
    pub(crate) fn completed(&self) -> impl Iterator<Item = DecodedPage> + '_ {
        self.results.try_iter()
    }

    #[cfg(test)]
    pub(crate) fn result_sender(&self) -> Sender<DecodedPage> {
        self.results_tx.clone()
    }
}

impl Drop for DecodeWorkers {
    fn drop(&mut self) {
        let dropped = self.queued.try_iter().count();
        if dropped > 0 {
            log::debug!("discarding {} queued page decodes", dropped);
        }
        self.jobs.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("page decode worker panicked");
            }
        }
    }
}

fn worker_loop(jobs: Receiver<DecodeJob>, results: Sender<DecodedPage>) {
    // Decoders are not shared between threads; each worker keeps one per book.
    let mut decoder: Option<(u64, Box<dyn PageDecoder>)> = None;

    for job in jobs.iter() {
        if decoder.as_ref().map(|(g, _)| *g) != Some(job.generation) {
            decoder = match job.provider.open_decoder() {
                Ok(d) => Some((job.generation, d)),
                Err(err) => {
                    log::error!("failed to open page decoder: {}", err);
                    None
                }
            };
        }

        let image = match decoder.as_mut() {
            Some((_, d)) => d.decode_full(job.page).unwrap_or_else(|err| {
                log::error!("failed to decode page {}: {}", job.page, err);
                RasterImage::error_placeholder()
            }),
            None => RasterImage::error_placeholder(),
        };

        let done = DecodedPage {
            generation: job.generation,
            page: job.page,
            image,
        };
        if results.send(done).is_err() {
            break;
        }
    }
}
