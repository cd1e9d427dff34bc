//! On-disk book cache.
//!
//! Layout under `<cache_root>/book_cache/<hash>/`:
//!
//! ```text
//!   000000.png  000001.png ...        full resolution pages
//!   low_res/000000.png ...            box-filtered to a fixed height
//! ```
//!
//! `<hash>` is the CRC-32 of the source path as 8 hex digits. A fresh import is built
//! in `<hash>.partial/` and renamed into place once every page is written, so an
//! interrupted import leaves nothing behind that looks complete.

use crate::error::{CacheError, DecodeError, OpenError};
use crate::raster::RasterImage;
use crate::source::{open_document, PageSource};
use crate::texture_pool::{PageDecoder, PageProvider};
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

pub const CACHE_DIR_NAME: &str = "book_cache";
pub const LOW_RES_DIR_NAME: &str = "low_res";
pub const DEFAULT_LOW_RES_HEIGHT: u32 = 100;

/// File name of page `index` inside the cache.
pub fn page_file_name(index: usize) -> String {
    format!("{:06}.png", index)
}

/// Cache directory for `source` below `cache_root`.
pub fn cache_dir_for(cache_root: &Path, source: &Path) -> PathBuf {
    let source = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let hash = crc32fast::hash(source.to_string_lossy().as_bytes());
    cache_root.join(CACHE_DIR_NAME).join(format!("{:08x}", hash))
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Import state shared with the UI thread.
#[derive(Debug, Default)]
pub struct ImportProgress {
    loading: AtomicBool,
    total: AtomicUsize,
    done: AtomicUsize,
}

impl ImportProgress {
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Fraction of pages written, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        let total = self.total.load(Ordering::Acquire);
        if total == 0 {
            return 0.0;
        }
        (self.done.load(Ordering::Acquire) as f32 / total as f32).min(1.0)
    }

    fn begin(&self, total: usize) {
        self.done.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
        self.loading.store(true, Ordering::Release);
    }

    fn page_done(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        self.loading.store(false, Ordering::Release);
    }
}

/// Clears the loading flag however the import ends.
struct LoadingGuard<'a>(&'a ImportProgress);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImportOptions {
    pub low_res_height: u32,
    /// Rebuild even when a complete cache exists.
    pub overwrite: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            low_res_height: DEFAULT_LOW_RES_HEIGHT,
            overwrite: false,
        }
    }
}

/// Makes sure the cache for `source` exists, importing it if needed. Returns the
/// cache directory.
pub fn import_book(
    source: &Path,
    cache_root: &Path,
    options: &ImportOptions,
    progress: &ImportProgress,
) -> Result<PathBuf, CacheError> {
    let dir = cache_dir_for(cache_root, source);
    let _guard = LoadingGuard(progress);

    if dir.join(LOW_RES_DIR_NAME).is_dir() {
        if !options.overwrite {
            log::info!("using cached pages for {} at {}", source.display(), dir.display());
            return Ok(dir);
        }
        std::fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
    }

    let count = open_document(source)?.page_count();
    if count == 0 {
        return Err(OpenError::Empty(source.to_path_buf()).into());
    }
    progress.begin(count);
    log::info!("importing {} ({} pages) into {}", source.display(), count, dir.display());

    let partial = dir.with_extension("partial");
    if partial.exists() {
        log::warn!("removing unfinished import at {}", partial.display());
        std::fs::remove_dir_all(&partial).map_err(io_err(&partial))?;
    }
    let low_res = partial.join(LOW_RES_DIR_NAME);
    std::fs::create_dir_all(&low_res).map_err(io_err(&low_res))?;

    let written = (0..count).into_par_iter().try_for_each_init(
        || open_document(source).map_err(|e| e.to_string()),
        |src, page| {
            let src = src.as_mut().map_err(|reason| CacheError::Reopen {
                page,
                reason: reason.clone(),
            })?;
            write_page(src.as_mut(), page, &partial, options.low_res_height)
                .map_err(|source| CacheError::Page { page, source })?;
            progress.page_done();
            Ok(())
        },
    );

    if let Err(err) = written {
        log::error!("import of {} failed: {}", source.display(), err);
        let _ = std::fs::remove_dir_all(&partial);
        return Err(err);
    }

    std::fs::rename(&partial, &dir).map_err(io_err(&dir))?;
    log::info!("imported {} pages into {}", count, dir.display());
    Ok(dir)
}

fn write_page(
    src: &mut dyn PageSource,
    page: usize,
    dir: &Path,
    low_res_height: u32,
) -> Result<(), DecodeError> {
    let image = src.decode_page(page, 1.0)?;
    let name = page_file_name(page);
    image.save_png(&dir.join(&name))?;
    image
        .downscale_to_height(low_res_height)
        .save_png(&dir.join(LOW_RES_DIR_NAME).join(&name))
}

/// A book whose pages are available from the cache directory.
///
/// Immutable once built; share it behind an [`Arc`].
#[derive(Debug)]
pub struct CachedBook {
    source: PathBuf,
    dir: PathBuf,
    pages: Arc<[String]>,
    first_page_aspect: f32,
}

impl CachedBook {
    /// Imports `source` if it is not cached yet, then lists its pages.
    pub fn open(
        source: &Path,
        cache_root: &Path,
        options: &ImportOptions,
        progress: &ImportProgress,
    ) -> Result<Self, CacheError> {
        let dir = import_book(source, cache_root, options, progress)?;
        Self::from_cache_dir(source, &dir)
    }

    /// Lists `low_res/*.png` in name order; the page count is the number of files.
    pub fn from_cache_dir(source: &Path, dir: &Path) -> Result<Self, CacheError> {
        let low_res = dir.join(LOW_RES_DIR_NAME);
        let mut pages = Vec::new();
        for entry in WalkDir::new(&low_res)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| CacheError::Io {
                path: low_res.clone(),
                source: e.into(),
            })?;
            let is_png = entry.path().extension().is_some_and(|e| e == "png");
            if entry.file_type().is_file() && is_png {
                pages.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        if pages.is_empty() {
            return Err(CacheError::NoPages(dir.to_path_buf()));
        }

        let first_full = dir.join(&pages[0]);
        let first = if first_full.is_file() {
            first_full
        } else {
            low_res.join(&pages[0])
        };
        let (w, h) = image::image_dimensions(&first).map_err(|e| CacheError::Page {
            page: 0,
            source: e.into(),
        })?;

        let book = Self {
            source: source.to_path_buf(),
            dir: dir.to_path_buf(),
            pages: pages.into(),
            first_page_aspect: w as f32 / h.max(1) as f32,
        };
        log::info!("loaded a book with {} pages", book.pages.len());
        Ok(book)
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Width over height of the first page; sizes the page grid.
    pub fn first_page_aspect(&self) -> f32 {
        self.first_page_aspect
    }

    pub fn low_res_path(&self, page: usize) -> Option<PathBuf> {
        self.pages
            .get(page)
            .map(|name| self.dir.join(LOW_RES_DIR_NAME).join(name))
    }
}

impl PageProvider for CachedBook {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_low_res(&self, page: usize) -> RasterImage {
        let Some(path) = self.low_res_path(page) else {
            log::error!(
                "page {} requested from a book with {} pages",
                page,
                self.pages.len()
            );
            return RasterImage::error_placeholder();
        };
        if !path.exists() {
            return RasterImage::blank();
        }
        RasterImage::load(&path).unwrap_or_else(|err| {
            log::error!("failed to load {}: {}", path.display(), err);
            RasterImage::error_placeholder()
        })
    }

    fn open_decoder(&self) -> Result<Box<dyn PageDecoder>, OpenError> {
        Ok(Box::new(CacheDecoder {
            source_path: self.source.clone(),
            dir: self.dir.clone(),
            pages: Arc::clone(&self.pages),
            source: None,
        }))
    }
}

/// Reads the cached full-resolution file, falling back to decoding the original
/// document when that file is missing.
struct CacheDecoder {
    source_path: PathBuf,
    dir: PathBuf,
    pages: Arc<[String]>,
    source: Option<Box<dyn PageSource>>,
}

impl PageDecoder for CacheDecoder {
    fn decode_full(&mut self, page: usize) -> Result<RasterImage, DecodeError> {
        let name = self.pages.get(page).ok_or(DecodeError::OutOfRange {
            index: page,
            count: self.pages.len(),
        })?;
        let cached = self.dir.join(name);
        if cached.is_file() {
            return RasterImage::load(&cached);
        }

        let source = match self.source.take() {
            Some(s) => s,
            None => open_document(&self.source_path)?,
        };
        self.source.insert(source).decode_page(page, 1.0)
    }
}
