//! Opens books off the render thread.

use crossbeam_channel::{Receiver, TryRecvError};
use pagecurl::{CacheError, CachedBook, ImportOptions, ImportProgress};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// One book being imported/opened on a background thread.
pub struct BookLoader {
    path: PathBuf,
    progress: Arc<ImportProgress>,
    result: Receiver<Result<CachedBook, CacheError>>,
}

impl BookLoader {
    pub fn spawn(path: &Path, cache_root: &Path) -> std::io::Result<Self> {
        let progress = Arc::new(ImportProgress::default());
        let (tx, rx) = crossbeam_channel::bounded(1);

        let (source, root, shared) = (path.to_path_buf(), cache_root.to_path_buf(), progress.clone());
        thread::Builder::new()
            .name("book-load".into())
            .spawn(move || {
                log::info!("opening {}", source.display());
                let result = CachedBook::open(&source, &root, &ImportOptions::default(), &shared);
                // The viewer may have moved on to another book.
                let _ = tx.send(result);
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            progress,
            result: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pages are still being written to the cache. False while an already cached
    /// book is being listed.
    pub fn is_importing(&self) -> bool {
        self.progress.is_loading()
    }

    pub fn progress(&self) -> f32 {
        self.progress.fraction()
    }

    /// The outcome once the thread is done; `None` while it is still working.
    pub fn poll(&self) -> Option<Result<CachedBook, String>> {
        match self.result.try_recv() {
            Ok(result) => Some(result.map_err(|err| err.to_string())),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err("book loader stopped unexpectedly".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecurl::{PageProvider, RasterImage};
    use std::time::{Duration, Instant};

    fn wait(loader: &BookLoader) -> Result<CachedBook, String> {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "book load timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("page_viewer-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_a_folder_book_in_the_background() {
        let root = scratch("loader-ok");
        let book = root.join("book");
        std::fs::create_dir_all(&book).unwrap();
        for i in 0..3u8 {
            RasterImage::new(20, 40, 1, vec![i * 50; 800])
                .save_png(&book.join(format!("{:02}.png", i)))
                .unwrap();
        }

        let loader = BookLoader::spawn(&book, &root).unwrap();
        let cached = wait(&loader).unwrap();
        assert_eq!(cached.page_count(), 3);
        assert!((cached.first_page_aspect() - 0.5).abs() < 1e-6);
        assert!(!loader.is_importing());
        assert_eq!(loader.progress(), 1.0);
    }

    #[test]
    fn failure_becomes_a_message() {
        let root = scratch("loader-err");
        let loader = BookLoader::spawn(&root.join("missing.pdf"), &root).unwrap();
        let err = wait(&loader).unwrap_err();
        assert!(err.contains("missing.pdf"), "{}", err);
    }
}
