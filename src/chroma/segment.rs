//! Green-screen segmentation heuristics.
//!
//! Two complementary keys produce background masks:
//!
//! - [`RangeKey`] tests hue, saturation and value against ranges around a
//!   target hue. It is precise and leaves greenish grays alone.
//! - [`RatioKey`] tests how strongly green dominates red and blue on the raw
//!   channels. It catches shadowed and tinted greens the range test misses.

use crate::chroma::hsv::{hue_distance, HsvImage};
use crate::chroma::morphology::{self, Connectivity, Mask};
use image::RgbaImage;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Hue/saturation/value range key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeKey {
    /// Target hue in degrees (120 is pure green).
    pub hue_center: f32,
    /// Maximum hue distance from the center, in degrees.
    pub hue_range: f32,
    /// Minimum saturation (0-100); pixels must exceed it.
    pub min_saturation: f32,
    /// Minimum value (0-100); pixels must exceed it.
    pub min_value: f32,
    /// Close the mask (dilate then erode) to fill pinholes.
    ///
    /// Erosion counts out-of-frame pixels as masked, so a full-bleed
    /// background keeps its outer row and column. scipy's `binary_erosion`
    /// counts them as unmasked and peels that frame off.
    pub cleanup: bool,
    /// Dilation/erosion iterations when `cleanup` is on.
    ///
    /// One iteration assumes the subject carries a thin white outline, as
    /// the sticker prompt asks for. Larger values start eating into it.
    pub cleanup_iterations: u32,
    /// Structuring element for the cleanup.
    pub connectivity: Connectivity,
}

impl Default for RangeKey {
    fn default() -> Self {
        Self {
            hue_center: 120.0,
            hue_range: 50.0,
            min_saturation: 15.0,
            min_value: 15.0,
            cleanup: true,
            cleanup_iterations: 1,
            connectivity: Connectivity::Four,
        }
    }
}

impl RangeKey {
    /// Creates a key with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target hue and its half-width.
    pub fn with_hue(mut self, center: f32, range: f32) -> Self {
        self.hue_center = center;
        self.hue_range = range;
        self
    }

    /// Sets the minimum saturation.
    pub fn with_min_saturation(mut self, min: f32) -> Self {
        self.min_saturation = min;
        self
    }

    /// Sets the minimum value.
    pub fn with_min_value(mut self, min: f32) -> Self {
        self.min_value = min;
        self
    }

    /// Enables or disables morphological cleanup.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Sets the dilation/erosion iterations of the cleanup.
    pub fn with_cleanup_iterations(mut self, iterations: u32) -> Self {
        self.cleanup_iterations = iterations;
        self
    }

    /// Sets the structuring element used by the cleanup.
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Classifies every pixel of `hsv`.
    pub fn mask(&self, hsv: &HsvImage) -> Mask {
        let raw = Zip::from(&hsv.hue)
            .and(&hsv.saturation)
            .and(&hsv.value)
            .map_collect(|&h, &s, &v| {
                hue_distance(h, self.hue_center) < self.hue_range
                    && s > self.min_saturation
                    && v > self.min_value
            });

        if self.cleanup && self.cleanup_iterations > 0 {
            morphology::close(&raw, self.connectivity, self.cleanup_iterations)
        } else {
            raw
        }
    }
}

/// Green-dominance ratio key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioKey {
    /// Pixels are masked when `g / (max(r, b) + 1)` exceeds this.
    pub green_ratio: f32,
    /// Dilation iterations applied to the mask. Zero keeps outlines intact.
    pub edge_dilation: u32,
    /// Structuring element for the dilation.
    pub connectivity: Connectivity,
}

impl Default for RatioKey {
    fn default() -> Self {
        Self {
            green_ratio: 1.2,
            edge_dilation: 0,
            connectivity: Connectivity::Four,
        }
    }
}

impl RatioKey {
    /// Creates a key with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dominance ratio.
    pub fn with_green_ratio(mut self, ratio: f32) -> Self {
        self.green_ratio = ratio;
        self
    }

    /// Sets the number of dilation iterations.
    pub fn with_edge_dilation(mut self, iterations: u32) -> Self {
        self.edge_dilation = iterations;
        self
    }

    /// Classifies every pixel of `image` from its raw RGB channels.
    pub fn mask(&self, image: &RgbaImage) -> Mask {
        let (w, h) = image.dimensions();
        let raw = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
            let [r, g, b, _] = image.get_pixel(col as u32, row as u32).0;
            let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
            let ratio = g / (r.max(b) + 1.0);
            ratio > self.green_ratio && g > r && g > b
        });

        morphology::dilate(&raw, self.connectivity, self.edge_dilation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::hsv::rgb_to_hsv;
    use image::Rgba;
    use proptest::prelude::*;

    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn pixel(rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn range_hit(key: &RangeKey, rgb: [u8; 3]) -> bool {
        key.mask(&rgb_to_hsv(&pixel(rgb)))[[0, 0]]
    }

    fn ratio_hit(key: &RatioKey, rgb: [u8; 3]) -> bool {
        key.mask(&pixel(rgb))[[0, 0]]
    }

    /// Left half red subject, right half green background.
    fn split_frame(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| if x < w / 2 { RED } else { GREEN })
    }

    #[test]
    fn test_range_key_green_vs_red_split() {
        let image = split_frame(16, 10);
        let mask = RangeKey::default().mask(&rgb_to_hsv(&image));

        for (x, y, _) in image.enumerate_pixels() {
            let masked = mask[[y as usize, x as usize]];
            if x < 8 {
                assert!(!masked, "subject pixel ({x},{y}) was masked");
            } else {
                assert!(masked, "background pixel ({x},{y}) was kept");
            }
        }
    }

    #[test]
    fn test_range_key_green_vs_red_centered_square() {
        let image = RgbaImage::from_fn(12, 12, |x, y| {
            if (4..8).contains(&x) && (4..8).contains(&y) {
                RED
            } else {
                GREEN
            }
        });
        let key = RangeKey::default().with_connectivity(Connectivity::Eight);
        let mask = key.mask(&rgb_to_hsv(&image));

        assert_eq!(morphology::count(&mask), 144 - 16);
        for y in 4..8 {
            for x in 4..8 {
                assert!(!mask[[y, x]]);
            }
        }
    }

    #[test]
    fn test_range_key_masks_dark_olive() {
        assert!(range_hit(&RangeKey::default(), [30, 60, 20]));
    }

    #[test]
    fn test_range_key_skips_dim_and_gray() {
        let key = RangeKey::default();
        assert!(!range_hit(&key, [10, 30, 10])); // value ~11.8%
        assert!(!range_hit(&key, [120, 128, 120])); // saturation ~6%
        assert!(!range_hit(&key, [255, 255, 255]));
        assert!(!range_hit(&key, [0, 0, 255]));
    }

    #[test]
    fn test_range_key_hue_window_wraps() {
        let key = RangeKey::default().with_hue(0.0, 10.0).with_cleanup(false);
        // Hue ~355, close to red across the wrap point.
        assert!(range_hit(&key, [255, 0, 21]));
        assert!(!range_hit(&key, [0, 255, 0]));
    }

    #[test]
    fn test_range_key_cleanup_fills_pinhole() {
        let mut image = RgbaImage::from_pixel(5, 5, GREEN);
        image.put_pixel(2, 2, Rgba([40, 40, 40, 255]));
        let hsv = rgb_to_hsv(&image);

        let raw = RangeKey::default().with_cleanup(false).mask(&hsv);
        assert!(!raw[[2, 2]]);

        let cleaned = RangeKey::default().mask(&hsv);
        assert!(cleaned[[2, 2]]);
    }

    #[test]
    fn test_range_key_cleanup_iterations_fill_wider_holes() {
        let mut image = RgbaImage::from_pixel(7, 7, GREEN);
        for y in 2..5 {
            for x in 2..5 {
                image.put_pixel(x, y, Rgba([40, 40, 40, 255]));
            }
        }
        let hsv = rgb_to_hsv(&image);

        let once = RangeKey::default().mask(&hsv);
        assert!(!once[[3, 3]]);

        let twice = RangeKey::default().with_cleanup_iterations(2).mask(&hsv);
        assert_eq!(twice.len(), morphology::count(&twice));
    }

    #[test]
    fn test_ratio_key_gray_not_masked() {
        assert!(!ratio_hit(&RatioKey::default(), [100, 100, 100]));
    }

    #[test]
    fn test_ratio_key_catches_shadowed_green() {
        let key = RatioKey::default();
        assert!(ratio_hit(&key, [0, 255, 0]));
        assert!(ratio_hit(&key, [20, 40, 25]));
        assert!(!ratio_hit(&key, [255, 0, 0]));
        // Green leads but not by enough.
        assert!(!ratio_hit(&key, [100, 110, 90]));
    }

    #[test]
    fn test_ratio_key_black_not_masked() {
        assert!(!ratio_hit(&RatioKey::default(), [0, 0, 0]));
    }

    #[test]
    fn test_ratio_key_edge_dilation_grows_mask() {
        let image = split_frame(10, 4);
        let plain = RatioKey::default().mask(&image);
        let grown = RatioKey::default().with_edge_dilation(2).mask(&image);

        assert_eq!(morphology::count(&plain), 20);
        assert_eq!(morphology::count(&grown), 28);
        assert!(grown[[0, 3]]);
        assert!(!grown[[0, 2]]);
    }

    #[test]
    fn test_keys_deserialize_with_defaults() {
        let key: RangeKey = serde_json::from_str(r#"{"hue_range": 30}"#).unwrap();
        assert_eq!(key.hue_range, 30.0);
        assert_eq!(key.hue_center, 120.0);
        assert_eq!(key.connectivity, Connectivity::Four);

        let key: RatioKey = serde_json::from_str(r#"{"connectivity": "eight"}"#).unwrap();
        assert_eq!(key.connectivity, Connectivity::Eight);
        assert_eq!(key.green_ratio, 1.2);
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
        fn relaxing_range_key_only_adds_pixels(
            image in arb_image(),
            widen in 0.0f32..60.0,
            lower_s in 0.0f32..15.0,
            lower_v in 0.0f32..15.0,
            cleanup in any::<bool>(),
        ) {
            let hsv = rgb_to_hsv(&image);
            let strict = RangeKey::default().with_cleanup(cleanup);
            let relaxed = strict
                .clone()
                .with_hue(strict.hue_center, strict.hue_range + widen)
                .with_min_saturation(strict.min_saturation - lower_s)
                .with_min_value(strict.min_value - lower_v);

            let a = strict.mask(&hsv);
            let b = relaxed.mask(&hsv);
            for (s, r) in a.iter().zip(b.iter()) {
                prop_assert!(!*s || *r);
            }
        }

        #[test]
        fn ratio_key_requires_green_dominance(image in arb_image()) {
            let mask = RatioKey::default().mask(&image);
            for (x, y, p) in image.enumerate_pixels() {
                if mask[[y as usize, x as usize]] {
                    prop_assert!(p[1] > p[0] && p[1] > p[2]);
                }
            }
        }
    }
}
