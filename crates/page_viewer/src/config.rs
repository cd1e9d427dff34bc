//! Command-line configuration.

use crate::preferences::DEFAULT_PREFERENCES_PATH;
use clap::Parser;
use pagecurl::{texture_pool::clamp_pool_size, GridDims, GridError};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Two-page book viewer with an animated page curl")]
pub struct ViewerArgs {
    /// Book to open on start: an image folder or a .cbz/.zip archive.
    #[arg(long, env = "PAGE_VIEWER_BOOK")]
    pub book: Option<PathBuf>,

    /// Directory that holds `book_cache/`.
    #[arg(long, env = "PAGE_VIEWER_CACHE_ROOT", default_value = ".")]
    pub cache_root: PathBuf,

    /// Page textures kept on the GPU (1-255).
    #[arg(long, default_value_t = pagecurl::texture_pool::DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    /// Grid points across a page.
    #[arg(long, default_value_t = 50)]
    pub grid_horizontal: u32,

    /// Grid points down a page.
    #[arg(long, default_value_t = 50)]
    pub grid_vertical: u32,

    /// Background threads decoding full-resolution pages.
    #[arg(long, default_value_t = pagecurl::workers::DEFAULT_DECODE_WORKERS)]
    pub decode_workers: usize,

    #[arg(long, env = "PAGE_VIEWER_PREFERENCES", default_value = DEFAULT_PREFERENCES_PATH)]
    pub preferences: PathBuf,

    /// Fold the turning page on the CPU instead of in a compute shader.
    #[arg(long)]
    pub cpu_fold: bool,
}

impl ViewerArgs {
    pub fn grid_dims(&self) -> Result<GridDims, GridError> {
        GridDims::new(self.grid_horizontal, self.grid_vertical)
    }

    pub fn pool_size(&self) -> usize {
        clamp_pool_size(self.pool_size)
    }

    pub fn decode_workers(&self) -> usize {
        self.decode_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ViewerArgs {
        ViewerArgs::try_parse_from(std::iter::once("page_viewer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.pool_size(), 8);
        assert_eq!(args.decode_workers(), 2);
        assert_eq!(args.grid_dims().unwrap(), GridDims::default());
        assert_eq!(args.preferences, PathBuf::from(DEFAULT_PREFERENCES_PATH));
        assert!(!args.cpu_fold);
    }

    #[test]
    fn pool_and_workers_are_clamped() {
        let args = parse(&["--pool-size", "1000", "--decode-workers", "0"]);
        assert_eq!(args.pool_size(), 255);
        assert_eq!(args.decode_workers(), 1);
        assert_eq!(parse(&["--pool-size", "0"]).pool_size(), 1);
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let args = parse(&["--grid-horizontal", "1"]);
        assert!(matches!(
            args.grid_dims(),
            Err(GridError::TooFewPoints { horizontal: 1, vertical: 50 })
        ));
    }
}
