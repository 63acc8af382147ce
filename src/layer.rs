use ndarray::{Array2, Array3};

use crate::color::LinearImage;
use crate::geometry::PixelBounds;
use crate::{MockupError, MockupResult};

/// A rendered frame: the warped creative plus the light it casts, positioned
/// on the background photo.
///
/// Buffers only span `bounds`; [`FrameLayer::to_canvas`] expands them to the
/// full photo size.
#[derive(Debug, Clone)]
pub struct FrameLayer {
    bounds: PixelBounds,
    /// Creative colour in linear light with the feathered coverage as alpha.
    image: LinearImage,
    /// Opacity of the black contact shadow painted beneath the creative.
    shadow: Option<Array2<f32>>,
    /// Linear light added on top after merging (night glow).
    emission: Option<Array3<f32>>,
}

impl FrameLayer {
    pub fn new(bounds: PixelBounds, image: LinearImage) -> MockupResult<Self> {
        let found = image.dimensions();
        let expected = (bounds.width, bounds.height);
        if found != expected {
            return Err(MockupError::compositing(format!(
                "layer buffer {found:?} does not match its bounds {expected:?}"
            )));
        }
        Ok(Self {
            bounds,
            image,
            shadow: None,
            emission: None,
        })
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn image(&self) -> &LinearImage {
        &self.image
    }

    pub fn shadow(&self) -> Option<&Array2<f32>> {
        self.shadow.as_ref()
    }

    pub fn emission(&self) -> Option<&Array3<f32>> {
        self.emission.as_ref()
    }

    pub fn with_image(mut self, image: LinearImage) -> Self {
        debug_assert_eq!(image.dimensions(), (self.bounds.width, self.bounds.height));
        self.image = image;
        self
    }

    pub fn with_shadow(mut self, shadow: Option<Array2<f32>>) -> Self {
        debug_assert!(
            shadow
                .as_ref()
                .is_none_or(|s| s.dim() == (self.bounds.height as usize, self.bounds.width as usize))
        );
        self.shadow = shadow;
        self
    }

    pub fn with_emission(mut self, emission: Option<Array3<f32>>) -> Self {
        debug_assert!(emission.as_ref().is_none_or(|e| e.dim()
            == (self.bounds.height as usize, self.bounds.width as usize, 3)));
        self.emission = emission;
        self
    }

    /// Flatten shadow, creative and emission into a straight-alpha RGBA image
    /// the size of the background photo, transparent outside the frame.
    pub fn to_canvas(&self, width: u32, height: u32) -> LinearImage {
        merge_layer(&LinearImage::new(width, height), self)
    }
}

/// Porter-Duff "over" of straight-alpha `top` onto straight-alpha `bottom`.
#[inline]
fn over(bottom: [f32; 4], top: [f32; 4]) -> [f32; 4] {
    let (fg_a, bg_a) = (top[3], bottom[3]);
    let out_a = fg_a + bg_a * (1.0 - fg_a);
    let mut out = [0f32; 4];
    if out_a > 0.0 {
        let fg_weight = fg_a / out_a;
        let bg_weight = (bg_a * (1.0 - fg_a)) / out_a;
        for c in 0..3 {
            out[c] = top[c] * fg_weight + bottom[c] * bg_weight;
        }
    }
    out[3] = out_a;
    out
}

/// Paint `layer` onto `canvas` in linear light and return the result.
///
/// Order per pixel: contact shadow, then the creative, then additive emission.
/// Parts of the layer outside the canvas are ignored.
pub fn merge_layer(canvas: &LinearImage, layer: &FrameLayer) -> LinearImage {
    let mut out = canvas.clone();
    let (cw, ch) = canvas.dimensions();
    let b = layer.bounds;
    for j in 0..b.height {
        let y = b.y + j;
        if y >= ch {
            break;
        }
        for i in 0..b.width {
            let x = b.x + i;
            if x >= cw {
                break;
            }
            let (iu, ju) = (i as usize, j as usize);
            let mut px = out.get(x, y);
            if let Some(shadow) = &layer.shadow {
                px = over(px, [0.0, 0.0, 0.0, shadow[[ju, iu]].clamp(0.0, 1.0)]);
            }
            px = over(px, layer.image.get(i, j));
            if let Some(emission) = &layer.emission {
                let a = px[3];
                if a > 0.0 {
                    for c in 0..3 {
                        px[c] += emission[[ju, iu, c]] / a;
                    }
                } else {
                    let peak = (0..3).fold(0f32, |m, c| m.max(emission[[ju, iu, c]]));
                    if peak > 0.0 {
                        let a = peak.min(1.0);
                        for c in 0..3 {
                            px[c] = emission[[ju, iu, c]] / a;
                        }
                        px[3] = a;
                    }
                }
            }
            out.put(x, y, px);
        }
    }
    out
}
