//! Document decoders. A [`PageSource`] is not shared between threads: every thread
//! that decodes pages opens its own instance through [`open_document`].

use crate::error::{DecodeError, OpenError};
use crate::raster::RasterImage;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions accepted as page images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

pub trait PageSource: Send {
    fn page_count(&self) -> usize;

    /// Decodes page `index`. `scale < 1.0` downsamples the result; larger values
    /// return the native resolution.
    fn decode_page(&mut self, index: usize, scale: f32) -> Result<RasterImage, DecodeError>;
}

/// Opens `path` as a new, independent page source.
pub fn open_document(path: &Path) -> Result<Box<dyn PageSource>, OpenError> {
    if path.is_dir() {
        return Ok(Box::new(ImageFolderSource::open(path)?));
    }
    match extension_of(path).as_deref() {
        Some("cbz") | Some("zip") => Ok(Box::new(CbzSource::open(path)?)),
        _ => Err(OpenError::Unsupported(path.to_path_buf())),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_page_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

fn apply_scale(image: RasterImage, scale: f32) -> RasterImage {
    if scale > 0.0 && scale < 1.0 {
        let target = ((image.height as f32 * scale).round() as u32).max(1);
        image.downscale_to_height(target)
    } else {
        image
    }
}

fn check_index(index: usize, count: usize) -> Result<(), DecodeError> {
    if index >= count {
        return Err(DecodeError::OutOfRange { index, count });
    }
    Ok(())
}

/// A directory of page images, ordered by file name.
pub struct ImageFolderSource {
    pages: Vec<PathBuf>,
}

impl ImageFolderSource {
    pub fn open(dir: &Path) -> Result<Self, OpenError> {
        let mut pages = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| OpenError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() && is_page_image(entry.path()) {
                pages.push(entry.into_path());
            }
        }
        if pages.is_empty() {
            return Err(OpenError::Empty(dir.to_path_buf()));
        }
        Ok(Self { pages })
    }
}

impl PageSource for ImageFolderSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn decode_page(&mut self, index: usize, scale: f32) -> Result<RasterImage, DecodeError> {
        check_index(index, self.pages.len())?;
        Ok(apply_scale(RasterImage::load(&self.pages[index])?, scale))
    }
}

/// A comic book archive: page images inside a zip file, ordered by entry name.
pub struct CbzSource {
    archive: zip::ZipArchive<BufReader<File>>,
    entries: Vec<String>,
}

impl CbzSource {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let file = File::open(path).map_err(|source| OpenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = zip::ZipArchive::new(BufReader::new(file))?;
        let mut entries: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && is_page_image(Path::new(name)))
            .map(str::to_owned)
            .collect();
        if entries.is_empty() {
            return Err(OpenError::Empty(path.to_path_buf()));
        }
        entries.sort();
        Ok(Self { archive, entries })
    }
}

impl PageSource for CbzSource {
    fn page_count(&self) -> usize {
        self.entries.len()
    }

    fn decode_page(&mut self, index: usize, scale: f32) -> Result<RasterImage, DecodeError> {
        check_index(index, self.entries.len())?;
        let mut entry = self.archive.by_name(&self.entries[index])?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        let image = RasterImage::from_dynamic(image::load_from_memory(&bytes)?);
        Ok(apply_scale(image, scale))
    }
}
