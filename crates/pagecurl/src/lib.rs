//! pagecurl: page-turn geometry and page streaming for a two-page book viewer.
//!
//! - Flat page grid (height 1.0, width = first page aspect) with a shared front/back
//!   index buffer.
//! - Analytic cylindrical fold of the grid about the line `y = k*x + b`.
//! - Turn driver that animates the fold and moves the spread by two pages.
//! - Frame planning: which pages are drawn flat and which pair is curling.
//! - Fixed-size page texture pool with low-resolution fill on miss and background
//!   full-resolution upgrades.
//! - Page sources (image folders, cbz archives) and the on-disk book cache.
//!
//! Nothing here touches the GPU; the viewer supplies a [`TextureSink`].

pub mod book_cache;
pub mod compositor;
pub mod error;
pub mod fold;
pub mod grid;
pub mod layout;
pub mod raster;
pub mod source;
pub mod texture_pool;
pub mod turn;
pub mod workers;

pub use book_cache::{cache_dir_for, import_book, CachedBook, ImportOptions, ImportProgress};
pub use compositor::{plan_frame, CurlPair, FlatPage, FramePlan};
pub use error::{CacheError, DecodeError, GridError, OpenError};
pub use fold::{deform_grid, fold_vertex, FoldState};
pub use grid::{page_indices, GridDims, PageGrid, PageVertex};
pub use layout::{BookLayout, PageContent};
pub use raster::RasterImage;
pub use source::{open_document, PageSource};
pub use texture_pool::{PageDecoder, PageProvider, PoolTexture, TexturePool, TextureSink};
pub use turn::{PageSide, PageTurner, TurnOutcome};
pub use workers::{DecodeWorkers, DecodedPage};
