//! Fixed-capacity page texture cache.
//!
//! Every slot holds one page. A miss evicts the next slot round-robin, fills it
//! synchronously with the low-resolution page and queues a full-resolution decode.
//! Decoded pages are uploaded by [`TexturePool::apply_pending_updates`], once per
//! frame, on the thread that owns the GPU; pages evicted in the meantime are dropped.
//!
//! Slots used by the current frame are pinned until [`TexturePool::begin_frame`], so
//! a later miss in the same frame never overwrites a page the frame already drew.
//! When every slot is pinned the page goes to one of [`FRAME_PAGES`] spill slots
//! past the end of the pool. Spill slots only ever hold low-resolution pages.
//!
//! The pool never talks to the GPU directly: uploads go through a [`TextureSink`].

use crate::error::{DecodeError, OpenError};
use crate::raster::RasterImage;
use crate::workers::{DecodeJob, DecodeWorkers, DecodedPage};
use std::sync::Arc;

pub const DEFAULT_POOL_SIZE: usize = 8;
pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 255;

/// Most pages one frame samples: two flat pages and both faces of the curl.
pub const FRAME_PAGES: usize = 4;

pub fn clamp_pool_size(size: usize) -> usize {
    size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
}

/// Receives pixel data for pool slots.
pub trait TextureSink {
    /// Replaces the contents of `slot` with `image`.
    fn upload(&mut self, slot: usize, image: &RasterImage);
}

/// Decodes full-resolution pages on a worker thread.
pub trait PageDecoder: Send {
    fn decode_full(&mut self, page: usize) -> Result<RasterImage, DecodeError>;
}

/// A loaded book as seen by the pool.
pub trait PageProvider: Send + Sync {
    fn page_count(&self) -> usize;

    /// Low-resolution page, or a placeholder: white when there is no cached file,
    /// the error colour when it cannot be read.
    fn load_low_res(&self, page: usize) -> RasterImage;

    /// A decoder for one worker thread.
    fn open_decoder(&self) -> Result<Box<dyn PageDecoder>, OpenError>;
}

/// A page resident in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolTexture {
    pub slot: usize,
    pub page: usize,
    pub colored: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    page: Option<usize>,
    colored: bool,
}

pub struct TexturePool {
    slots: Vec<Slot>,
    spill: [Slot; FRAME_PAGES],
    /// Pool slots then spill slots touched since the last `begin_frame`.
    pinned: Vec<bool>,
    cursor: usize,
    provider: Option<Arc<dyn PageProvider>>,
    generation: u64,
    workers: DecodeWorkers,
}

impl TexturePool {
    pub fn new(size: usize, workers: DecodeWorkers) -> Self {
        let size = clamp_pool_size(size);
        Self {
            slots: vec![Slot::default(); size],
            spill: [Slot::default(); FRAME_PAGES],
            pinned: vec![false; size + FRAME_PAGES],
            cursor: 0,
            provider: None,
            generation: 0,
            workers,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Texture slots the sink has to provide: the pool plus the spill slots.
    pub fn texture_slots(&self) -> usize {
        self.slots.len() + FRAME_PAGES
    }

    pub fn page_count(&self) -> usize {
        self.provider.as_ref().map_or(0, |p| p.page_count())
    }

    pub fn workers(&self) -> &DecodeWorkers {
        &self.workers
    }

    /// Switches to another book (or none). Every slot becomes unassigned and
    /// decodes still running for the previous book are ignored when they land.
    pub fn set_book(&mut self, provider: Option<Arc<dyn PageProvider>>) {
        self.provider = provider;
        self.generation += 1;
        self.slots.fill(Slot::default());
        self.spill = [Slot::default(); FRAME_PAGES];
        self.pinned.fill(false);
        self.cursor = 0;
        log::debug!(
            "texture pool reset for book generation {} ({} pages)",
            self.generation,
            self.page_count()
        );
    }

    /// Rebuilds the pool with `size` slots, clamped to `[1, 255]`.
    pub fn resize(&mut self, size: usize) {
        let size = clamp_pool_size(size);
        self.slots = vec![Slot::default(); size];
        self.spill = [Slot::default(); FRAME_PAGES];
        self.pinned = vec![false; size + FRAME_PAGES];
        self.cursor = 0;
        log::info!("texture pool resized to {} slots", size);
    }

    /// Unpins every slot. Call once per frame before resolving its pages.
    pub fn begin_frame(&mut self) {
        self.pinned.fill(false);
    }

    pub fn slot_of(&self, page: usize) -> Option<usize> {
        self.slots.iter().position(|s| s.page == Some(page))
    }

    /// Pages currently held, in slot order.
    pub fn resident_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|s| s.page)
    }

    /// Returns the slot holding `page`, loading it on a miss, and pins it for the
    /// rest of the frame.
    ///
    /// `page` is clamped to the book. Returns `None` when no book (or an empty one)
    /// is loaded, or when the frame has already used every pool and spill slot.
    pub fn get(&mut self, page: usize, sink: &mut impl TextureSink) -> Option<PoolTexture> {
        let provider = self.provider.clone()?;
        let count = provider.page_count();
        if count == 0 {
            return None;
        }
        let page = page.min(count - 1);

        if let Some(slot) = self.slot_of(page) {
            self.pinned[slot] = true;
            return Some(PoolTexture {
                slot,
                page,
                colored: self.slots[slot].colored,
            });
        }

        let Some(slot) = self.next_unpinned() else {
            return self.get_spilled(page, provider.as_ref(), sink);
        };
        self.cursor = slot;
        self.pinned[slot] = true;
        if let Some(evicted) = self.slots[slot].page {
            log::debug!("evicting page {} from slot {}", evicted, slot);
        }

        let image = provider.load_low_res(page);
        sink.upload(slot, &image);
        self.slots[slot] = Slot {
            page: Some(page),
            colored: image.is_colored(),
        };
        log::debug!("page {} loaded into slot {} at low resolution", page, slot);

        self.workers.submit(DecodeJob {
            generation: self.generation,
            page,
            provider,
        });

        Some(PoolTexture {
            slot,
            page,
            colored: self.slots[slot].colored,
        })
    }

    /// Next slot after the cursor that the current frame has not pinned.
    fn next_unpinned(&self) -> Option<usize> {
        let len = self.slots.len();
        (1..=len)
            .map(|step| (self.cursor + step) % len)
            .find(|&slot| !self.pinned[slot])
    }

    /// Serves a page the pool has no free slot for this frame. Spilled pages are
    /// never upgraded, so no decode is queued for them.
    fn get_spilled(
        &mut self,
        page: usize,
        provider: &dyn PageProvider,
        sink: &mut impl TextureSink,
    ) -> Option<PoolTexture> {
        let base = self.slots.len();
        let index = match self.spill.iter().position(|s| s.page == Some(page)) {
            Some(index) => index,
            None => {
                let Some(index) = (0..FRAME_PAGES).find(|&i| !self.pinned[base + i]) else {
                    log::warn!("no texture slot left this frame for page {}", page);
                    return None;
                };
                let image = provider.load_low_res(page);
                sink.upload(base + index, &image);
                self.spill[index] = Slot {
                    page: Some(page),
                    colored: image.is_colored(),
                };
                log::debug!(
                    "pool of {} is pinned, page {} spilled to slot {}",
                    base,
                    page,
                    base + index
                );
                index
            }
        };
        self.pinned[base + index] = true;
        Some(PoolTexture {
            slot: base + index,
            page,
            colored: self.spill[index].colored,
        })
    }

    /// Uploads finished full-resolution decodes for pages that are still resident.
    ///
    /// At most one upload per slot: if several decodes of the same page arrived,
    /// the newest wins. Upgraded slots stay pinned for the rest of the frame.
    /// Returns the number of uploads.
    pub fn apply_pending_updates(&mut self, sink: &mut impl TextureSink) -> usize {
        let mut pending: Vec<Option<DecodedPage>> = Vec::new();
        pending.resize_with(self.slots.len(), || None);

        for done in self.workers.completed() {
            if done.generation != self.generation {
                log::debug!("dropping page {} decoded for a previous book", done.page);
                continue;
            }
            match self.slot_of(done.page) {
                Some(slot) => pending[slot] = Some(done),
                None => log::debug!("dropping stale decode of evicted page {}", done.page),
            }
        }

        let mut uploaded = 0;
        for (slot, done) in pending.into_iter().enumerate() {
            if let Some(done) = done {
                sink.upload(slot, &done.image);
                self.slots[slot].colored = done.image.is_colored();
                self.pinned[slot] = true;
                uploaded += 1;
                log::debug!(
                    "page {} upgraded in slot {} ({}x{})",
                    done.page,
                    slot,
                    done.image.width,
                    done.image.height
                );
            }
        }
        uploaded
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub uploads: Vec<(usize, RasterImage)>,
    }

    impl TextureSink for RecordingSink {
        fn upload(&mut self, slot: usize, image: &RasterImage) {
            self.uploads.push((slot, image.clone()));
        }
    }

    fn page_image(tag: u8, height: u32) -> RasterImage {
        RasterImage::new(1, height, 1, vec![tag; height as usize])
    }

    /// Low-res pages are `1 x 2`, full-res `1 x 8`; pixel value is the page index.
    struct MemoryBook {
        count: usize,
        fail_full: bool,
    }

    struct MemoryDecoder {
        fail: bool,
    }

    impl PageDecoder for MemoryDecoder {
        fn decode_full(&mut self, page: usize) -> Result<RasterImage, DecodeError> {
            if self.fail {
                return Err(DecodeError::OutOfRange { index: page, count: 0 });
            }
            Ok(page_image(page as u8, 8))
        }
    }

    impl PageProvider for MemoryBook {
        fn page_count(&self) -> usize {
            self.count
        }

        fn load_low_res(&self, page: usize) -> RasterImage {
            page_image(page as u8, 2)
        }

        fn open_decoder(&self) -> Result<Box<dyn PageDecoder>, OpenError> {
            Ok(Box::new(MemoryDecoder {
                fail: self.fail_full,
            }))
        }
    }

    fn book(count: usize) -> Option<Arc<dyn PageProvider>> {
        Some(Arc::new(MemoryBook {
            count,
            fail_full: false,
        }))
    }

    fn detached_pool(size: usize, count: usize) -> TexturePool {
        let mut pool = TexturePool::new(size, DecodeWorkers::detached());
        pool.set_book(book(count));
        pool
    }

    /// Resolves `page` as the only page of a fresh frame.
    fn get_next_frame(
        pool: &mut TexturePool,
        page: usize,
        sink: &mut RecordingSink,
    ) -> Option<PoolTexture> {
        pool.begin_frame();
        pool.get(page, sink)
    }

    fn full(generation: u64, page: usize, tag: u8) -> DecodedPage {
        DecodedPage {
            generation,
            page,
            image: page_image(tag, 8),
        }
    }

    #[test]
    fn size_is_clamped() {
        assert_eq!(TexturePool::new(0, DecodeWorkers::detached()).len(), 1);
        assert_eq!(TexturePool::new(1000, DecodeWorkers::detached()).len(), 255);
        let mut pool = TexturePool::new(8, DecodeWorkers::detached());
        pool.resize(300);
        assert_eq!(pool.len(), 255);
    }

    #[test]
    fn no_book_no_texture() {
        let mut pool = TexturePool::new(4, DecodeWorkers::detached());
        let mut sink = RecordingSink::default();
        assert_eq!(pool.get(0, &mut sink), None);
        pool.set_book(book(0));
        assert_eq!(pool.get(0, &mut sink), None);
        assert!(sink.uploads.is_empty());
    }

    #[test]
    fn distinct_gets_never_exceed_capacity() {
        let n = 4;
        let mut pool = detached_pool(n, 10);
        let mut sink = RecordingSink::default();
        for page in 0..10 {
            let tex = get_next_frame(&mut pool, page, &mut sink).unwrap();
            assert_eq!(tex.page, page);
            assert_eq!(pool.slot_of(page), Some(tex.slot));
            let resident: Vec<_> = pool.resident_pages().collect();
            assert!(resident.len() <= n);
            assert!(resident.contains(&page));
        }
        assert_eq!(sink.uploads.len(), 10);
        assert_eq!(pool.workers().queued_jobs(), 10);
    }

    #[test]
    fn eviction_is_round_robin() {
        let mut pool = detached_pool(3, 10);
        let mut sink = RecordingSink::default();
        let slots: Vec<_> = (0..6)
            .map(|p| get_next_frame(&mut pool, p, &mut sink).unwrap().slot)
            .collect();
        assert_eq!(slots, vec![1, 2, 0, 1, 2, 0]);
        assert_eq!(pool.resident_pages().collect::<Vec<_>>(), vec![5, 3, 4]);
    }

    #[test]
    fn hit_does_not_reload() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        let a = pool.get(3, &mut sink).unwrap();
        let b = pool.get(3, &mut sink).unwrap();
        assert_eq!(a, b);
        assert_eq!(sink.uploads.len(), 1);
        assert_eq!(pool.workers().queued_jobs(), 1);
    }

    #[test]
    fn out_of_range_pages_clamp_to_the_last() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        assert_eq!(pool.get(50, &mut sink).unwrap().page, 9);
        assert_eq!(sink.uploads[0].1.pixels[0], 9);
    }

    #[test]
    fn low_res_fills_slot_synchronously() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        let tex = pool.get(7, &mut sink).unwrap();
        let (slot, image) = &sink.uploads[0];
        assert_eq!(*slot, tex.slot);
        assert_eq!((image.height, image.pixels[0]), (2, 7));
        assert!(!tex.colored);
    }

    #[test]
    fn stale_update_is_discarded() {
        let mut pool = detached_pool(2, 10);
        let mut sink = RecordingSink::default();
        let first = get_next_frame(&mut pool, 0, &mut sink).unwrap();
        get_next_frame(&mut pool, 1, &mut sink);
        get_next_frame(&mut pool, 2, &mut sink); // evicts page 0
        assert_eq!(pool.slot_of(0), None);
        let before = sink.uploads.len();

        let tx = pool.workers().result_sender();
        tx.send(full(pool.generation, 0, 0)).unwrap();
        assert_eq!(pool.apply_pending_updates(&mut sink), 0);
        assert_eq!(sink.uploads.len(), before);
        // The slot that held page 0 still shows page 2.
        assert_eq!(pool.resident_pages().nth(first.slot), Some(2));
    }

    #[test]
    fn previous_book_results_are_discarded() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        let old_generation = pool.generation;
        pool.set_book(book(10));
        pool.get(3, &mut sink);
        let before = sink.uploads.len();
        pool.workers().result_sender().send(full(old_generation, 3, 3)).unwrap();
        assert_eq!(pool.apply_pending_updates(&mut sink), 0);
        assert_eq!(sink.uploads.len(), before);
    }

    #[test]
    fn one_upload_per_slot_newest_wins() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        let tex = pool.get(5, &mut sink).unwrap();
        let tx = pool.workers().result_sender();
        tx.send(full(pool.generation, 5, 100)).unwrap();
        tx.send(full(pool.generation, 5, 200)).unwrap();
        assert_eq!(pool.apply_pending_updates(&mut sink), 1);
        let (slot, image) = sink.uploads.last().unwrap();
        assert_eq!(*slot, tex.slot);
        assert_eq!(image.pixels[0], 200);
        assert_eq!(pool.apply_pending_updates(&mut sink), 0);
    }

    #[test]
    fn colour_flag_tracks_the_latest_upload() {
        let mut pool = detached_pool(4, 10);
        let mut sink = RecordingSink::default();
        let tex = pool.get(1, &mut sink).unwrap();
        assert!(!tex.colored);
        let color = RasterImage::new(1, 1, 3, vec![255, 0, 0]);
        pool.workers()
            .result_sender()
            .send(DecodedPage {
                generation: pool.generation,
                page: 1,
                image: color,
            })
            .unwrap();
        pool.apply_pending_updates(&mut sink);
        assert!(pool.get(1, &mut sink).unwrap().colored);
    }

    /// Pages of a frame turning from display page 4 to 6: two flat pages and both
    /// faces of the curl.
    const TURN_FRAME: [usize; 4] = [3, 6, 4, 5];

    /// Resolves one frame and returns, per page, the tag last uploaded to its slot.
    fn draw_frame(pool: &mut TexturePool, sink: &mut RecordingSink, pages: &[usize]) -> Vec<u8> {
        pool.begin_frame();
        let slots: Vec<_> = pages
            .iter()
            .map(|&page| pool.get(page, sink).unwrap().slot)
            .collect();
        slots
            .iter()
            .map(|&slot| {
                let (_, image) = sink.uploads.iter().rev().find(|(s, _)| *s == slot).unwrap();
                image.pixels[0]
            })
            .collect()
    }

    #[test]
    fn small_pools_keep_every_page_of_a_frame() {
        for size in 1..=3 {
            let mut pool = detached_pool(size, 10);
            let mut sink = RecordingSink::default();
            assert_eq!(pool.texture_slots(), size + FRAME_PAGES);

            let drawn = draw_frame(&mut pool, &mut sink, &TURN_FRAME);
            assert_eq!(drawn, vec![3, 6, 4, 5], "pool of {}", size);
            let mut written: Vec<_> = sink.uploads.iter().map(|(slot, _)| *slot).collect();
            written.sort_unstable();
            written.dedup();
            assert_eq!(written.len(), sink.uploads.len(), "pool of {}", size);
            assert!(written.iter().all(|&slot| slot < pool.texture_slots()));
            assert_eq!(pool.workers().queued_jobs(), size);

            // The same frame again loads nothing and queues nothing.
            let uploads = sink.uploads.len();
            assert_eq!(draw_frame(&mut pool, &mut sink, &TURN_FRAME), vec![3, 6, 4, 5]);
            assert_eq!(sink.uploads.len(), uploads);
            assert_eq!(pool.workers().queued_jobs(), size);
        }
    }

    #[test]
    fn upgraded_slot_is_not_reused_in_the_same_frame() {
        let mut pool = detached_pool(1, 10);
        let mut sink = RecordingSink::default();
        get_next_frame(&mut pool, 2, &mut sink);
        pool.begin_frame();
        pool.workers().result_sender().send(full(pool.generation, 2, 22)).unwrap();
        assert_eq!(pool.apply_pending_updates(&mut sink), 1);

        let tex = pool.get(7, &mut sink).unwrap();
        assert_eq!(tex.slot, 1);
        assert_eq!(pool.slot_of(2), Some(0));
        assert_eq!(pool.resident_pages().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn frame_with_too_many_pages_runs_out_of_slots() {
        let mut pool = detached_pool(1, 10);
        let mut sink = RecordingSink::default();
        pool.begin_frame();
        for page in 0..=FRAME_PAGES {
            assert!(pool.get(page, &mut sink).is_some());
        }
        assert_eq!(pool.get(9, &mut sink), None);
    }

    fn wait_for_upgrade(pool: &mut TexturePool, sink: &mut RecordingSink) -> RasterImage {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if pool.apply_pending_updates(sink) > 0 {
                return sink.uploads.last().unwrap().1.clone();
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no high resolution upgrade arrived");
    }

    #[test]
    fn workers_upgrade_resident_pages() {
        let mut pool = TexturePool::new(4, DecodeWorkers::new(2).unwrap());
        pool.set_book(book(10));
        let mut sink = RecordingSink::default();
        pool.get(6, &mut sink);
        let upgraded = wait_for_upgrade(&mut pool, &mut sink);
        assert_eq!((upgraded.height, upgraded.pixels[0]), (8, 6));
    }

    #[test]
    fn failed_decode_uploads_error_placeholder() {
        let mut pool = TexturePool::new(4, DecodeWorkers::new(1).unwrap());
        pool.set_book(Some(Arc::new(MemoryBook {
            count: 3,
            fail_full: true,
        })));
        let mut sink = RecordingSink::default();
        pool.get(0, &mut sink);
        assert_eq!(wait_for_upgrade(&mut pool, &mut sink), RasterImage::error_placeholder());
    }
}
