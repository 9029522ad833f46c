//! Binary dilation and erosion over boolean masks.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Binary mask indexed `[row, col]`; `true` marks removable background.
pub type Mask = Array2<bool>;

/// Neighborhood used by the structuring element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Plus-shaped neighborhood: up, down, left, right.
    #[default]
    Four,
    /// Full 3x3 neighborhood, diagonals included.
    Eight,
}

const CROSS: [(i64, i64); 5] = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];
const SQUARE: [(i64, i64); 9] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 0),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Self::Four => &CROSS,
            Self::Eight => &SQUARE,
        }
    }
}

/// Looks up a neighbor, returning `outside` for out-of-frame positions.
fn neighbor(mask: &Mask, row: usize, col: usize, (dr, dc): (i64, i64), outside: bool) -> bool {
    let (h, w) = mask.dim();
    let nr = row as i64 + dr;
    let nc = col as i64 + dc;
    if nr < 0 || nc < 0 || nr >= h as i64 || nc >= w as i64 {
        return outside;
    }
    mask[[nr as usize, nc as usize]]
}

fn dilate_once(mask: &Mask, connectivity: Connectivity) -> Mask {
    let offsets = connectivity.offsets();
    Array2::from_shape_fn(mask.dim(), |(row, col)| {
        offsets
            .iter()
            .any(|&off| neighbor(mask, row, col, off, false))
    })
}

fn erode_once(mask: &Mask, connectivity: Connectivity) -> Mask {
    let offsets = connectivity.offsets();
    Array2::from_shape_fn(mask.dim(), |(row, col)| {
        offsets
            .iter()
            .all(|&off| neighbor(mask, row, col, off, true))
    })
}

/// Grows masked regions by one pixel per iteration.
///
/// Out-of-frame pixels count as unmasked, so nothing grows in from the edges.
pub fn dilate(mask: &Mask, connectivity: Connectivity, iterations: u32) -> Mask {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate_once(&out, connectivity);
    }
    out
}

/// Shrinks masked regions by one pixel per iteration.
///
/// Out-of-frame pixels count as masked: the area outside the raster is
/// background, so a mask touching the border is not peeled back from it.
pub fn erode(mask: &Mask, connectivity: Connectivity, iterations: u32) -> Mask {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode_once(&out, connectivity);
    }
    out
}

/// Dilation followed by erosion. Fills pinholes and narrow gaps in the mask
/// without net growth of its outer boundary.
pub fn close(mask: &Mask, connectivity: Connectivity, iterations: u32) -> Mask {
    erode(&dilate(mask, connectivity, iterations), connectivity, iterations)
}

/// Number of masked pixels.
pub fn count(mask: &Mask) -> usize {
    mask.iter().filter(|&&m| m).count()
}
