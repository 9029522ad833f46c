//! RGB to HSV conversion over whole rasters.

use image::RgbaImage;
use ndarray::{Array2, Zip};

/// HSV planes for a raster, indexed `[row, col]`.
///
/// Hue is in degrees `[0, 360)`, saturation and value are percentages
/// `[0, 100]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HsvImage {
    /// Hue in degrees.
    pub hue: Array2<f32>,
    /// Saturation, 0-100.
    pub saturation: Array2<f32>,
    /// Value (brightness), 0-100.
    pub value: Array2<f32>,
}

impl HsvImage {
    /// Returns `(height, width)` of the planes.
    pub fn dim(&self) -> (usize, usize) {
        self.hue.dim()
    }
}

/// Splits the RGB channels of a raster into normalized `[0, 1]` planes.
fn channel_planes(image: &RgbaImage) -> (Array2<f32>, Array2<f32>, Array2<f32>) {
    let (w, h) = image.dimensions();
    let shape = (h as usize, w as usize);
    let plane = |c: usize| {
        Array2::from_shape_fn(shape, |(row, col)| {
            f32::from(image.get_pixel(col as u32, row as u32).0[c]) / 255.0
        })
    };
    (plane(0), plane(1), plane(2))
}

/// Converts the RGB channels of `image` to HSV. Alpha is ignored.
pub fn rgb_to_hsv(image: &RgbaImage) -> HsvImage {
    let (r, g, b) = channel_planes(image);
    let shape = r.dim();

    let max_c = Zip::from(&r).and(&g).and(&b).map_collect(|&r, &g, &b| r.max(g).max(b));
    let min_c = Zip::from(&r).and(&g).and(&b).map_collect(|&r, &g, &b| r.min(g).min(b));
    let delta = &max_c - &min_c;

    // Branch masks; red wins ties over green, green over blue.
    let chromatic = delta.mapv(|d| d != 0.0);
    let red_max = Zip::from(&max_c)
        .and(&r)
        .and(&chromatic)
        .map_collect(|&m, &r, &c| c && m == r);
    let green_max = Zip::from(&max_c)
        .and(&g)
        .and(&chromatic)
        .and(&red_max)
        .map_collect(|&m, &g, &c, &rm| c && !rm && m == g);
    let blue_max = Zip::from(&chromatic)
        .and(&red_max)
        .and(&green_max)
        .map_collect(|&c, &rm, &gm| c && !rm && !gm);

    let mut hue = Array2::<f32>::zeros(shape);
    Zip::from(&mut hue)
        .and(&red_max)
        .and(&g)
        .and(&b)
        .and(&delta)
        .for_each(|h, &m, &g, &b, &d| {
            if m {
                *h = (60.0 * ((g - b) / d) + 360.0) % 360.0;
            }
        });
    Zip::from(&mut hue)
        .and(&green_max)
        .and(&b)
        .and(&r)
        .and(&delta)
        .for_each(|h, &m, &b, &r, &d| {
            if m {
                *h = 60.0 * ((b - r) / d) + 120.0;
            }
        });
    Zip::from(&mut hue)
        .and(&blue_max)
        .and(&r)
        .and(&g)
        .and(&delta)
        .for_each(|h, &m, &r, &g, &d| {
            if m {
                *h = 60.0 * ((r - g) / d) + 240.0;
            }
        });

    let saturation = Zip::from(&delta)
        .and(&max_c)
        .map_collect(|&d, &m| if m == 0.0 { 0.0 } else { d / m * 100.0 });
    let value = max_c.mapv(|m| m * 100.0);

    HsvImage {
        hue,
        saturation,
        value,
    }
}

/// Converts one HSV triple (hue in degrees, saturation and value 0-100)
/// back to 8-bit RGB.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let s = (saturation / 100.0).clamp(0.0, 1.0);
    let v = (value / 100.0).clamp(0.0, 1.0);
    let h = hue.rem_euclid(360.0) / 60.0;

    let chroma = v * s;
    let x = chroma * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - chroma;

    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let to_u8 = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

/// Angular distance between two hues, in degrees. Always in `[0, 180]`.
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs();
    diff.min(360.0 - diff)
}
