//! Imports books into the page cache so the viewer opens them without waiting.

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};
use pagecurl::{book_cache::DEFAULT_LOW_RES_HEIGHT, CachedBook, ImportOptions, ImportProgress, PageProvider};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "book2cache", version)]
struct Args {
    /// Books to import: image folders or .cbz/.zip archives.
    #[arg(required = true)]
    books: Vec<PathBuf>,

    /// Directory that holds `book_cache/`.
    #[arg(long, default_value = ".")]
    cache_root: PathBuf,

    /// Height in pixels of the low-resolution page copies.
    #[arg(long, default_value_t = DEFAULT_LOW_RES_HEIGHT)]
    low_res_height: u32,

    /// Rebuild caches that already exist.
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl Args {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            low_res_height: self.low_res_height.max(1),
            overwrite: self.overwrite,
        }
    }
}

fn import_one(path: &Path, args: &Args) -> Result<usize> {
    let started = Instant::now();
    let progress = ImportProgress::default();
    let book = CachedBook::open(path, &args.cache_root, &args.options(), &progress)?;
    info!(
        "{}: {} pages in {} ({:.1}s)",
        path.display(),
        book.page_count(),
        book.cache_dir().display(),
        started.elapsed().as_secs_f32()
    );
    Ok(book.page_count())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Processing {} books...", args.books.len());

    let mut pages = 0;
    let mut failed = 0;
    for book in &args.books {
        match import_one(book, &args) {
            Ok(count) => pages += count,
            Err(err) => {
                error!("Failed to import {}: {:#}", book.display(), err);
                failed += 1;
            }
        }
    }

    info!(
        "Done: {} books, {} pages cached, {} failed.",
        args.books.len() - failed,
        pages,
        failed
    );
    if failed > 0 {
        bail!("{} of {} books failed to import", failed, args.books.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_flags() {
        let args = Args::parse_from(["book2cache", "a.cbz", "b", "--low-res-height", "0", "--overwrite"]);
        assert_eq!(args.books.len(), 2);
        let options = args.options();
        assert_eq!(options.low_res_height, 1);
        assert!(options.overwrite);
    }

    #[test]
    fn books_are_required() {
        assert!(Args::try_parse_from(["book2cache"]).is_err());
    }
}
