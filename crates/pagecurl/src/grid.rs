//! Flat page grid: vertices for one page (height 1.0, width = aspect ratio) and the
//! shared front/back index buffer used to draw it.

use crate::error::GridError;

/// One page vertex. Layout matches the `PageVertex` struct in the WGSL shaders.
///
/// `position.w` is the curl factor written by the fold transform (1.0 when flat).
/// `tex_coord.xy` is the page UV; the back-face copy carries `u` mirrored and
/// both coordinates offset by `+2.0` so shading can tell the faces apart.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PageVertex {
    pub position: [f32; 4],
    pub tex_coord: [f32; 4],
}

/// Offset added to back-face texture coordinates.
pub const BACK_FACE_UV_OFFSET: f32 = 2.0;

/// Grid resolution in points per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDims {
    horizontal: u32,
    vertical: u32,
}

impl GridDims {
    pub fn new(horizontal: u32, vertical: u32) -> Result<Self, GridError> {
        if horizontal < 2 || vertical < 2 {
            return Err(GridError::TooFewPoints {
                horizontal,
                vertical,
            });
        }
        Ok(Self {
            horizontal,
            vertical,
        })
    }

    #[inline]
    pub fn horizontal(&self) -> u32 {
        self.horizontal
    }

    #[inline]
    pub fn vertical(&self) -> u32 {
        self.vertical
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.horizontal as usize * self.vertical as usize
    }

    /// Indices for one face: `(H-1)(V-1)` quads, two triangles each.
    #[inline]
    pub fn face_index_count(&self) -> usize {
        (self.horizontal as usize - 1) * (self.vertical as usize - 1) * 6
    }

    /// Compute work-groups for an 8x8 kernel covering the grid.
    pub fn dispatch_size(&self, group: u32) -> (u32, u32) {
        (
            self.horizontal.div_ceil(group),
            self.vertical.div_ceil(group),
        )
    }
}

impl Default for GridDims {
    fn default() -> Self {
        Self {
            horizontal: 50,
            vertical: 50,
        }
    }
}

/// A flat page grid sized to a page aspect ratio.
#[derive(Clone, Debug)]
pub struct PageGrid {
    pub dims: GridDims,
    pub cell_size: [f32; 2],
    pub vertices: Vec<PageVertex>,
}

impl PageGrid {
    /// Builds `H*V` vertices row-major; vertex `(i, j)` sits at
    /// `(cell_x * i, cell_y * j, 0)` with UV `(i/(H-1), 1 - j/(V-1))`.
    pub fn new(dims: GridDims, aspect: f32) -> Self {
        let (h, v) = (dims.horizontal, dims.vertical);
        let cell_y = 1.0 / (v - 1) as f32;
        let cell_x = cell_y * aspect;

        let mut vertices = Vec::with_capacity(dims.vertex_count());
        for j in 0..v {
            for i in 0..h {
                vertices.push(PageVertex {
                    position: [cell_x * i as f32, cell_y * j as f32, 0.0, 1.0],
                    tex_coord: [
                        i as f32 / (h - 1) as f32,
                        1.0 - j as f32 / (v - 1) as f32,
                        0.0,
                        0.0,
                    ],
                });
            }
        }

        Self {
            dims,
            cell_size: [cell_x, cell_y],
            vertices,
        }
    }

    pub fn width(&self) -> f32 {
        self.cell_size[0] * (self.dims.horizontal - 1) as f32
    }

    pub fn height(&self) -> f32 {
        self.cell_size[1] * (self.dims.vertical - 1) as f32
    }
}

/// Triangle indices for one face of an `H x V` grid.
pub fn face_indices(dims: GridDims) -> Vec<u32> {
    let (x, y) = (dims.horizontal, dims.vertical);
    let mut out = Vec::with_capacity(dims.face_index_count());
    for j in 0..y - 1 {
        for i in 0..x - 1 {
            let k = i + j * x;
            out.extend_from_slice(&[k, k + 1, k + x, k + x, k + 1, k + 1 + x]);
        }
    }
    out
}

/// Front-face indices followed by the back face: the same triangles with reversed
/// winding, addressing the second `H*V` block of the deformed vertex buffer.
///
/// Flat pages draw only the first `face_index_count` entries.
pub fn page_indices(dims: GridDims) -> Vec<u32> {
    let front = face_indices(dims);
    let shift = dims.vertex_count() as u32;
    let mut out = Vec::with_capacity(front.len() * 2);
    out.extend_from_slice(&front);
    for tri in front.chunks_exact(3) {
        out.extend_from_slice(&[tri[0] + shift, tri[2] + shift, tri[1] + shift]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_grids() {
        assert_eq!(
            GridDims::new(1, 50),
            Err(GridError::TooFewPoints {
                horizontal: 1,
                vertical: 50
            })
        );
        assert!(GridDims::new(50, 0).is_err());
        assert!(GridDims::new(2, 2).is_ok());
    }

    #[test]
    fn vertex_and_index_counts() {
        for (h, v) in [(2, 2), (3, 7), (50, 50), (9, 2)] {
            let dims = GridDims::new(h, v).unwrap();
            let grid = PageGrid::new(dims, 0.7);
            assert_eq!(grid.vertices.len(), (h * v) as usize);
            assert_eq!(face_indices(dims).len(), ((h - 1) * (v - 1) * 6) as usize);
            assert_eq!(page_indices(dims).len(), ((h - 1) * (v - 1) * 12) as usize);
        }
    }

    #[test]
    fn corner_uvs_and_extent() {
        let dims = GridDims::new(5, 4).unwrap();
        let grid = PageGrid::new(dims, 0.75);
        let first = grid.vertices[0];
        let last = grid.vertices[grid.vertices.len() - 1];
        assert_eq!(&first.tex_coord[..2], &[0.0, 1.0]);
        assert_eq!(&last.tex_coord[..2], &[1.0, 0.0]);
        assert!((grid.height() - 1.0).abs() < 1e-6);
        assert!((grid.width() - 0.75).abs() < 1e-6);
        assert!((last.position[0] - 0.75).abs() < 1e-6);
        assert!((last.position[1] - 1.0).abs() < 1e-6);
        assert!(grid.vertices.iter().all(|v| v.position[3] == 1.0));
    }

    #[test]
    fn back_face_is_shifted_and_reversed() {
        let dims = GridDims::new(3, 3).unwrap();
        let all = page_indices(dims);
        let n = dims.face_index_count();
        let shift = dims.vertex_count() as u32;
        assert_eq!(&all[..6], &[0, 1, 3, 3, 1, 4]);
        assert_eq!(&all[n..n + 6], &[shift, 3 + shift, 1 + shift, 3 + shift, 4 + shift, 1 + shift]);
        assert!(all[..n].iter().all(|&i| i < shift));
        assert!(all[n..].iter().all(|&i| i >= shift && i < 2 * shift));
    }

    #[test]
    fn dispatch_covers_grid() {
        let dims = GridDims::new(50, 17).unwrap();
        assert_eq!(dims.dispatch_size(8), (7, 3));
    }
}
