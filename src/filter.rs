//! Gaussian filtering and box downsampling on float planes.
//!
//! Blurs run through `imageproc` on `f32` buffers so nothing is quantised.

use image::{ImageBuffer, Luma, Rgba, Rgba32FImage};
use imageproc::filter::gaussian_blur_f32;
use ndarray::{Array2, Array3};

use crate::color::LinearImage;

/// Single-channel `f32` image, the buffer type masks are blurred in.
pub type PlaneImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Convert a blur radius in pixels to the Gaussian sigma used for it.
///
/// `gaussian_blur_f32` truncates its kernel at two sigma, so the radius is
/// how far the blur reaches.
pub fn radius_to_sigma(radius: f32) -> f32 {
    radius / 2.0
}

/// Pixels a blur of `sigma` spreads a value by.
pub fn blur_reach(sigma: f32) -> u32 {
    if sigma <= 0.0 {
        0
    } else {
        (2.0 * sigma).ceil() as u32
    }
}

pub fn plane_to_image(plane: &Array2<f32>) -> PlaneImage {
    let (h, w) = plane.dim();
    PlaneImage::from_fn(w as u32, h as u32, |x, y| Luma([plane[[y as usize, x as usize]]]))
}

pub fn image_to_plane(image: &PlaneImage) -> Array2<f32> {
    let (w, h) = image.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        image.get_pixel(x as u32, y as u32)[0]
    })
}

/// Gaussian blur of a single plane with clamped borders. `sigma <= 0` is a copy.
pub fn blur_plane(plane: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 || plane.is_empty() {
        return plane.clone();
    }
    image_to_plane(&gaussian_blur_f32(&plane_to_image(plane), sigma))
}

/// Blur the colour of a linear image, weighting by alpha so transparent
/// pixels do not bleed into opaque ones. Alpha is kept as-is.
pub fn blur_color(image: &LinearImage, sigma: f32) -> LinearImage {
    let (w, h) = image.dimensions();
    if sigma <= 0.0 || w == 0 || h == 0 {
        return image.clone();
    }
    // Colour premultiplied by a floored alpha, with that weight in the fourth channel.
    let weighted = Rgba32FImage::from_fn(w, h, |x, y| {
        let px = image.get(x, y);
        let weight = px[3].max(1e-4);
        Rgba([px[0] * weight, px[1] * weight, px[2] * weight, weight])
    });
    let blurred = gaussian_blur_f32(&weighted, sigma);

    let mut out = image.clone();
    for (x, y, px) in blurred.enumerate_pixels() {
        let [r, g, b, weight] = px.0;
        let alpha = image.get(x, y)[3];
        let rgb = if weight > 0.0 {
            [r / weight, g / weight, b / weight]
        } else {
            [0.0; 3]
        };
        out.put(x, y, [rgb[0], rgb[1], rgb[2], alpha]);
    }
    out
}

/// Average `factor`×`factor` blocks of every channel. Dimensions must be
/// multiples of `factor`.
pub fn box_downsample(data: &Array3<f32>, factor: usize) -> Array3<f32> {
    if factor <= 1 {
        return data.clone();
    }
    let (h, w, ch) = data.dim();
    let (oh, ow) = (h / factor, w / factor);
    let inv = 1.0 / (factor * factor) as f32;
    let mut out = Array3::zeros((oh, ow, ch));
    for oy in 0..oh {
        for ox in 0..ow {
            for c in 0..ch {
                let mut acc = 0.0;
                for sy in 0..factor {
                    for sx in 0..factor {
                        acc += data[[oy * factor + sy, ox * factor + sx, c]];
                    }
                }
                out[[oy, ox, c]] = acc * inv;
            }
        }
    }
    out
}
