//! Analytic cylindrical page fold.
//!
//! The page is wrapped around a cylinder of radius [`CURL_RADIUS`] whose axis is the
//! fold line `y = k*x + b` in page space. Arc length is preserved, so the paper never
//! stretches. The transform is a pure function of one vertex and the fold state; the
//! GPU kernel in `page_viewer` (`shaders/fold.wgsl`) mirrors [`fold_vertex`] line for line.

use crate::grid::{PageGrid, PageVertex, BACK_FACE_UV_OFFSET};
use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;
use std::f32::consts::PI;

/// Radius of the curl cylinder in page units (page height is 1.0).
pub const CURL_RADIUS: f32 = 0.05;
/// Fraction of the page width within which the fold line counts as "near an edge"
/// and the curled shape is blended towards the fully turned page.
pub const TERMINAL_BLEND_BAND: f32 = 0.15;
/// Added to `|k|` before dividing by it in the terminal blend test.
pub const SLOPE_EPSILON: f32 = 1e-5;

/// Fold line and turn parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FoldState {
    /// Slope of the fold line.
    pub k: f32,
    /// Intercept of the fold line.
    pub b: f32,
    /// `|k|` at which the page starts bending.
    pub k_interp_start: f32,
    /// `|k|` at which the page is fully turned.
    pub k_interp_end: f32,
    /// The right page lifts and lands on the left (otherwise the left page turns right).
    pub from_right_to_left: bool,
    /// A turn animation is in progress.
    pub auto_turn: bool,
}

impl Default for FoldState {
    fn default() -> Self {
        Self {
            k: 2.0,
            b: -1.0,
            k_interp_start: 10.0,
            k_interp_end: 100.0,
            from_right_to_left: true,
            auto_turn: false,
        }
    }
}

impl FoldState {
    /// Bend angle: zero up to `k_interp_start`, then linear up to `PI` at `k_interp_end`.
    pub fn theta(&self) -> f32 {
        let k = self.k.abs().min(self.k_interp_end);
        if k > self.k_interp_start {
            PI * (k - self.k_interp_start) / (self.k_interp_end - self.k_interp_start)
        } else {
            0.0
        }
    }

    /// Turn progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        (self.k.abs() / self.k_interp_end).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.k.abs() >= self.k_interp_end
    }
}

/// `sign` that maps zero to zero.
#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Maps one flat-page position onto the curled page. Returns `(x, y, z, curl)`.
///
/// `width`/`height` are the unrolled page extent. When the left page turns
/// (`from_right_to_left == false`) the page is first moved to `x in [-width, 0]`.
pub fn fold_vertex(position: Vec3, fold: &FoldState, width: f32, height: f32) -> Vec4 {
    let mut p = position;
    let turn_bit = if fold.from_right_to_left {
        1.0
    } else {
        p.x -= width;
        -1.0
    };

    let k = sign(fold.k) * fold.k.abs().min(fold.k_interp_end);
    let theta = fold.theta();

    // Keep the fold line outside the unrolled page on the side it sweeps from.
    let b = if k * turn_bit > 0.0 {
        fold.b.min(0.0)
    } else {
        fold.b.max(height)
    };

    let r = CURL_RADIUS;
    let cx = (p.x + (p.y - b) * k) / (1.0 + k * k);
    let cy = k * cx + b;
    let dist = Vec2::new(cx, cy).distance(p.truncate());

    let mut out = Vec4::new(p.x, p.y, p.z, 1.0);
    let flat = turn_bit * k * (k * p.x + b - p.y) <= 0.0;
    if !flat {
        // Moving `rel` along the fold normal (1, -1/k)/|.| gives
        // dx = rel*|k|/sqrt(k^2+1) and dy = -rel*sign(k)/sqrt(k^2+1); written this
        // way the slope is never a divisor.
        let inv_norm = 1.0 / (k * k + 1.0).sqrt();
        let step = |rel: f32| {
            let along = rel * turn_bit * inv_norm;
            (cx + along * k.abs(), cy - along * sign(k))
        };
        if dist < (PI - theta) * r {
            // Still on the cylinder.
            let alpha = dist / r;
            let (x, y) = step(r * ((alpha + theta).sin() - theta.sin()));
            out = Vec4::new(
                x,
                y,
                r * (theta.cos() - (alpha + theta).cos()),
                (alpha + theta).cos().abs(),
            );
        } else {
            // Past the cylinder, lying flat on top of the page.
            let (x, y) = step(-(dist - (PI - theta - theta.sin()) * r));
            out = Vec4::new(x, y, r * (1.0 + theta.cos()), 1.0);
        }
    }

    // Near either terminal state blend towards the mirrored flat page so the
    // turn lands exactly flat.
    let kk = k.abs() + SLOPE_EPSILON;
    let near_bottom = (b / kk).abs() / width;
    let near_top = ((height - b) / kk).abs() / width;
    if near_bottom.min(near_top) <= TERMINAL_BLEND_BAND {
        let target = Vec3::new(-p.x, p.y, p.z);
        let a = (k.abs() / fold.k_interp_end).powi(2).clamp(0.0, 1.0);
        let blended = target * a + out.truncate() * (1.0 - a);
        out = blended.extend(out.w);
    }

    out
}

/// Writes the deformed front face into `out[..n]` and the mirrored back face into
/// `out[n..2n]`, where `n` is the grid vertex count. Runs in parallel per vertex.
pub fn deform_grid(grid: &PageGrid, fold: &FoldState, out: &mut [PageVertex]) {
    let n = grid.vertices.len();
    assert_eq!(out.len(), n * 2, "deformed buffer must hold front and back faces");
    let (width, height) = (grid.width(), grid.height());
    let (front, back) = out.split_at_mut(n);

    front
        .par_iter_mut()
        .zip(back.par_iter_mut())
        .zip(grid.vertices.par_iter())
        .for_each(|((f, bk), src)| {
            let p = Vec3::from_slice(&src.position[..3]);
            let pos = fold_vertex(p, fold, width, height).to_array();
            *f = PageVertex {
                position: pos,
                tex_coord: src.tex_coord,
            };
            *bk = back_face(pos, src.tex_coord);
        });
}

#[inline]
fn back_face(position: [f32; 4], tex_coord: [f32; 4]) -> PageVertex {
    PageVertex {
        position,
        tex_coord: [
            1.0 - tex_coord[0] + BACK_FACE_UV_OFFSET,
            tex_coord[1] + BACK_FACE_UV_OFFSET,
            tex_coord[2],
            tex_coord[3],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;

    fn grid() -> PageGrid {
        PageGrid::new(GridDims::new(21, 31).unwrap(), 0.7)
    }

    fn fold_at(k: f32, rtl: bool) -> FoldState {
        FoldState {
            k,
            b: -1.0,
            from_right_to_left: rtl,
            auto_turn: true,
            ..FoldState::default()
        }
    }

    fn deform(g: &PageGrid, f: &FoldState) -> Vec<PageVertex> {
        let mut out = vec![PageVertex::default(); g.vertices.len() * 2];
        deform_grid(g, f, &mut out);
        out
    }

    #[test]
    fn flat_at_rest() {
        let g = grid();
        let out = deform(&g, &fold_at(0.0, true));
        for (src, dst) in g.vertices.iter().zip(&out) {
            assert_eq!(src.position, dst.position);
        }
    }

    #[test]
    fn left_page_at_rest_is_only_shifted() {
        let g = grid();
        let w = g.width();
        let out = deform(&g, &fold_at(0.0, false));
        for (src, dst) in g.vertices.iter().zip(&out) {
            assert!((dst.position[0] - (src.position[0] - w)).abs() < 1e-6);
            assert_eq!(dst.position[1], src.position[1]);
            assert_eq!(dst.position[2], 0.0);
        }
    }

    #[test]
    fn completed_turn_lands_mirrored_and_flat() {
        let g = grid();
        for rtl in [true, false] {
            let end = FoldState::default().k_interp_end;
            let k = if rtl { end } else { -end };
            let out = deform(&g, &fold_at(k, rtl));
            let w = g.width();
            for (src, dst) in g.vertices.iter().zip(&out) {
                let x = if rtl { src.position[0] } else { src.position[0] - w };
                assert!((dst.position[0] + x).abs() < 1e-4, "{:?} -> {:?}", src, dst);
                assert!((dst.position[1] - src.position[1]).abs() < 1e-4);
                assert!(dst.position[2].abs() < 1e-4);
            }
        }
    }

    #[test]
    fn mid_turn_curls_within_cylinder() {
        let g = grid();
        let out = deform(&g, &fold_at(3.0, true));
        let n = g.vertices.len();
        let lifted = out[..n].iter().filter(|v| v.position[2] > 1e-4).count();
        let untouched = g
            .vertices
            .iter()
            .zip(&out[..n])
            .filter(|(s, d)| s.position == d.position)
            .count();
        assert!(lifted > 0, "a mid-turn page must leave the plane");
        assert!(untouched > 0, "part of the page stays flat");
        for v in &out {
            assert!(v.position.iter().all(|c| c.is_finite()));
            assert!(v.position[2] <= 2.0 * CURL_RADIUS + 1e-4);
            assert!((0.0..=1.0).contains(&v.position[3]));
        }
    }

    #[test]
    fn near_edge_fold_blends_partway_and_keeps_curl_shading() {
        // y = 20x - 1 meets the bottom edge at x = 0.05, inside the terminal band of
        // a 0.7 wide page, so the shape is only 4% of the way to the mirrored page.
        let fold = fold_at(20.0, true);
        let p = Vec3::new(0.15, 0.0, 0.0);
        let out = fold_vertex(p, &fold, 0.7, 1.0);

        let normal = Vec2::new(20.0, -1.0).normalize();
        let dist = (20.0 * p.x - 1.0 - p.y) / 401f32.sqrt();
        let foot = p.truncate() - normal * dist;
        let theta = fold.theta();
        let angle = dist / CURL_RADIUS + theta;
        assert!(angle > PI / 2.0 && angle < PI, "on the far half of the cylinder");
        assert!((out.w - angle.cos().abs()).abs() < 1e-5, "{} vs {}", out.w, angle.cos());

        let curled = (foot + normal * CURL_RADIUS * (angle.sin() - theta.sin()))
            .extend(CURL_RADIUS * (theta.cos() - angle.cos()));
        let mirrored = Vec3::new(-p.x, p.y, p.z);
        let a = (20.0f32 / fold.k_interp_end).powi(2);
        assert!(a > 0.0 && a < 1.0);
        let expected = mirrored * a + curled * (1.0 - a);
        let got = out.truncate();
        assert!(got.distance(expected) < 1e-5, "{:?} vs {:?}", got, expected);
        assert!(got.distance(curled) > 1e-3);
        assert!(got.distance(mirrored) > 1e-3);
    }

    #[test]
    fn bent_fold_stays_finite() {
        let g = grid();
        for k in [1e-9, -1e-9, 15.0, -55.0, 99.9, 1e6] {
            for rtl in [true, false] {
                let out = deform(&g, &fold_at(k, rtl));
                assert!(out.iter().all(|v| v.position.iter().all(|c| c.is_finite())));
            }
        }
    }

    #[test]
    fn back_face_copy_mirrors_uv() {
        let g = grid();
        let out = deform(&g, &fold_at(1.5, true));
        let n = g.vertices.len();
        for i in [0, 7, n - 1] {
            let (f, b) = (out[i], out[i + n]);
            assert_eq!(f.position, b.position);
            assert!((b.tex_coord[0] - (3.0 - f.tex_coord[0])).abs() < 1e-6);
            assert!((b.tex_coord[1] - (f.tex_coord[1] + 2.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn theta_ramp() {
        let mut f = FoldState::default();
        f.k = 5.0;
        assert_eq!(f.theta(), 0.0);
        f.k = -55.0;
        assert!((f.theta() - PI / 2.0).abs() < 1e-5);
        f.k = 1000.0;
        assert!((f.theta() - PI).abs() < 1e-5);
    }
}
