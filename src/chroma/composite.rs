//! Alpha compositing: masking pixels out and hardening edges.

use crate::chroma::morphology::{self, Mask};
use crate::error::{Result, StickerError};
use image::RgbaImage;

/// Default alpha threshold for [`binarize_alpha`].
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// Checks that `mask` covers `image` exactly.
pub(crate) fn ensure_same_dimensions(image: &RgbaImage, mask: &Mask) -> Result<()> {
    let (w, h) = image.dimensions();
    let (mh, mw) = mask.dim();
    if mh != h as usize || mw != w as usize {
        return Err(StickerError::InvariantViolation(format!(
            "mask is {mw}x{mh} but raster is {w}x{h}"
        )));
    }
    Ok(())
}

/// Returns a copy of `image` with alpha zeroed wherever `mask` is set.
///
/// RGB channels are left untouched.
pub fn apply_mask(image: &RgbaImage, mask: &Mask) -> Result<RgbaImage> {
    ensure_same_dimensions(image, mask)?;

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if mask[[y as usize, x as usize]] {
            pixel.0[3] = 0;
        }
    }
    Ok(out)
}

/// Snaps every alpha value to 0 or 255.
///
/// Values below `threshold` become fully transparent, the rest fully
/// opaque. This removes the semi-transparent halo anti-aliased edges leave
/// behind.
pub fn binarize_alpha(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[3] = if pixel.0[3] < threshold { 0 } else { 255 };
    }
    out
}

/// Fraction of the mask that is set, in `[0, 1]`.
pub fn coverage(mask: &Mask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    morphology::count(mask) as f64 / mask.len() as f64
}

/// Fraction of fully transparent pixels, in `[0, 1]`.
pub fn transparent_fraction(image: &RgbaImage) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0.0;
    }
    let clear = image.pixels().filter(|p| p.0[3] == 0).count();
    clear as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use ndarray::Array2;
    use proptest::prelude::*;

    #[test]
    fn test_apply_mask_zeroes_alpha_only() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let mut mask = Array2::from_elem((2, 2), false);
        mask[[1, 0]] = true;

        let out = apply_mask(&image, &mask).unwrap();
        assert_eq!(out.get_pixel(0, 1), &Rgba([10, 20, 30, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([10, 20, 30, 255]));
        // Input is not touched.
        assert_eq!(image.get_pixel(0, 1).0[3], 255);
    }

    #[test]
    fn test_apply_mask_dimension_mismatch() {
        let image = RgbaImage::new(3, 2);
        let mask = Array2::from_elem((3, 2), true);
        let err = apply_mask(&image, &mask).unwrap_err();
        assert!(matches!(err, StickerError::InvariantViolation(_)));
        assert!(err.to_string().contains("mask is 2x3 but raster is 3x2"));
    }

    #[test]
    fn test_binarize_alpha_threshold_edges() {
        let mut image = RgbaImage::new(4, 1);
        for (x, a) in [0u8, 127, 128, 254].into_iter().enumerate() {
            image.put_pixel(x as u32, 0, Rgba([1, 2, 3, a]));
        }
        let out = binarize_alpha(&image, DEFAULT_ALPHA_THRESHOLD);
        let alphas: Vec<u8> = out.pixels().map(|p| p.0[3]).collect();
        assert_eq!(alphas, vec![0, 0, 255, 255]);
        assert!(out.pixels().all(|p| p.0[..3] == [1, 2, 3]));
    }

    #[test]
    fn test_coverage_and_transparency() {
        let mut mask = Array2::from_elem((2, 2), false);
        mask[[0, 0]] = true;
        assert_eq!(coverage(&mask), 0.25);

        let image = apply_mask(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])), &mask).unwrap();
        assert_eq!(transparent_fraction(&image), 0.25);
        assert_eq!(transparent_fraction(&RgbaImage::new(0, 0)), 0.0);
    }

    fn arb_image() -> impl Strategy<Value = RgbaImage> {
        (1u32..6, 1u32..6).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h * 4) as usize).prop_map(move |buf| {
                RgbaImage::from_raw(w, h, buf).expect("buffer matches dimensions")
            })
        })
    }

    proptest! {
        #[test]
        fn binarized_alpha_is_zero_or_opaque(image in arb_image(), threshold in any::<u8>()) {
            let out = binarize_alpha(&image, threshold);
            prop_assert!(out.pixels().all(|p| p.0[3] == 0 || p.0[3] == 255));
        }

        #[test]
        fn binarize_is_idempotent(image in arb_image(), threshold in any::<u8>()) {
            let once = binarize_alpha(&image, threshold);
            let twice = binarize_alpha(&once, threshold);
            prop_assert_eq!(once, twice);
        }
    }
}
