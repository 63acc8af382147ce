//! sRGB transfer functions and the linear-light working buffer.
//!
//! Every averaging or blurring step in the crate runs on [`LinearImage`]; 8-bit
//! images only appear at the boundaries (decoded inputs, encoded output).

use std::sync::LazyLock;

use image::{Rgba, Rgba32FImage, RgbaImage};
use ndarray::{Array2, Array3, s};

static DECODE_LUT: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut lut = [0f32; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = srgb_to_linear(i as f32 / 255.0);
    }
    lut
});

/// sRGB-encoded value in [0, 1] to linear light.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear light in [0, 1] to an sRGB-encoded value.
pub fn linear_to_srgb(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Decode an 8-bit sRGB channel.
#[inline]
pub fn decode_u8(v: u8) -> f32 {
    DECODE_LUT[v as usize]
}

/// Encode a linear channel as 8-bit sRGB.
#[inline]
pub fn encode_u8(v: f32) -> u8 {
    (linear_to_srgb(v) * 255.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn alpha_to_u8(a: f32) -> u8 {
    (a * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Rec. 709 luminance of a linear RGB triple.
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
}

/// Linear-light RGBA image with straight (non-premultiplied) alpha.
///
/// Stored as an `(height, width, 4)` array.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearImage {
    data: Array3<f32>,
}

impl LinearImage {
    /// A fully transparent black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Array3::zeros((height as usize, width as usize, 4)),
        }
    }

    pub fn from_pixel(width: u32, height: u32, px: [f32; 4]) -> Self {
        let mut data = Array3::zeros((height as usize, width as usize, 4));
        for (c, v) in px.iter().enumerate() {
            data.slice_mut(s![.., .., c]).fill(*v);
        }
        Self { data }
    }

    pub fn from_array(data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim().2, 4);
        Self { data }
    }

    /// Decode an 8-bit sRGB image into linear light.
    pub fn from_srgba(image: &RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        let mut data = Array3::zeros((h as usize, w as usize, 4));
        for (x, y, px) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            data[[y, x, 0]] = decode_u8(px[0]);
            data[[y, x, 1]] = decode_u8(px[1]);
            data[[y, x, 2]] = decode_u8(px[2]);
            data[[y, x, 3]] = f32::from(px[3]) / 255.0;
        }
        Self { data }
    }

    /// Encode back to 8-bit sRGB.
    pub fn to_srgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let p = self.get(x, y);
            Rgba([
                encode_u8(p[0]),
                encode_u8(p[1]),
                encode_u8(p[2]),
                alpha_to_u8(p[3]),
            ])
        })
    }

    pub fn width(&self) -> u32 {
        self.data.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.data.dim().0 as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        let (x, y) = (x as usize, y as usize);
        [
            self.data[[y, x, 0]],
            self.data[[y, x, 1]],
            self.data[[y, x, 2]],
            self.data[[y, x, 3]],
        ]
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, px: [f32; 4]) {
        let (x, y) = (x as usize, y as usize);
        for (c, v) in px.into_iter().enumerate() {
            self.data[[y, x, c]] = v;
        }
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }

    /// Copy of one channel as a 2D plane.
    pub fn channel(&self, c: usize) -> Array2<f32> {
        self.data.slice(s![.., .., c]).to_owned()
    }

    /// Replace one channel with `plane`, which must match the image size.
    pub fn with_channel(mut self, c: usize, plane: &Array2<f32>) -> Self {
        self.data.slice_mut(s![.., .., c]).assign(plane);
        self
    }

    /// Alpha channel as a plane.
    pub fn alpha(&self) -> Array2<f32> {
        self.channel(3)
    }

    /// Apply `f` to the RGB triple of every pixel, leaving alpha untouched.
    pub fn map_rgb(&self, mut f: impl FnMut([f32; 3]) -> [f32; 3]) -> Self {
        let mut out = self.clone();
        for mut px in out.data.rows_mut() {
            let rgb = f([px[0], px[1], px[2]]);
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
        out
    }

    /// Copy out of an `f32` RGBA buffer already in linear light.
    pub fn from_rgba32f(image: &Rgba32FImage) -> Self {
        let (w, h) = image.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 4), |(y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c]
        });
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod transfer {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn endpoints_are_fixed() {
                assert_eq!(srgb_to_linear(0.0), 0.0);
                assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
                assert_eq!(linear_to_srgb(0.0), 0.0);
                assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
            }

            #[test]
            fn mid_gray_is_darker_in_linear() {
                // sRGB 128 is roughly 21.6% linear light
                let lin = decode_u8(128);
                assert!((lin - 0.2158).abs() < 1e-3, "got {lin}");
            }

            #[test]
            fn averaging_black_and_white_in_linear_is_brighter_than_naive() {
                let avg = (decode_u8(0) + decode_u8(255)) / 2.0;
                // Naive sRGB averaging would give 128.
                assert_eq!(encode_u8(avg), 188);
            }

            #[test]
            fn encode_clamps_out_of_range() {
                assert_eq!(encode_u8(-0.5), 0);
                assert_eq!(encode_u8(3.0), 255);
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// decode_u8 / encode_u8: every 8-bit value survives the round trip
                #[test]
                fn u8_round_trip(v in proptest::num::u8::ANY) {
                    prop_assert_eq!(encode_u8(decode_u8(v)), v);
                }

                /// srgb_to_linear is monotonic
                #[test]
                fn decode_monotonic(a in 0.0f32..1.0, b in 0.0f32..1.0) {
                    prop_assume!(a < b);
                    prop_assert!(srgb_to_linear(a) <= srgb_to_linear(b));
                }
            }
        }
    }

    mod linear_image {
        use super::*;

        #[test]
        fn srgba_round_trip_is_exact() {
            let mut img = RgbaImage::new(3, 2);
            img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
            img.put_pixel(1, 0, Rgba([12, 200, 99, 128]));
            img.put_pixel(2, 0, Rgba([255, 255, 255, 255]));
            img.put_pixel(0, 1, Rgba([1, 2, 3, 4]));
            img.put_pixel(1, 1, Rgba([250, 128, 7, 77]));
            img.put_pixel(2, 1, Rgba([64, 64, 64, 255]));

            let back = LinearImage::from_srgba(&img).to_srgba();
            assert_eq!(back, img);
        }

        #[test]
        fn dimensions_follow_width_height_order() {
            let img = LinearImage::new(5, 3);
            assert_eq!(img.dimensions(), (5, 3));
            assert_eq!(img.as_array().dim(), (3, 5, 4));
        }

        #[test]
        fn from_rgba32f_keeps_layout() {
            let buffer = Rgba32FImage::from_fn(3, 2, |x, y| Rgba([x as f32, y as f32, 0.5, 1.0]));
            let img = LinearImage::from_rgba32f(&buffer);
            assert_eq!(img.dimensions(), (3, 2));
            assert_eq!(img.get(2, 1), [2.0, 1.0, 0.5, 1.0]);
        }

        #[test]
        fn map_rgb_keeps_alpha() {
            let img = LinearImage::from_pixel(1, 1, [0.2, 0.2, 0.2, 0.4]);
            let out = img.map_rgb(|[r, g, b]| [r * 2.0, g, b]);
            assert_eq!(out.get(0, 0), [0.4, 0.2, 0.2, 0.4]);
        }
    }
}
