//! Per-frame effect stages and the order they run in.

use std::fmt;

use crate::adjust::{
    adjust_brightness, adjust_contrast, adjust_saturation, adjust_temperature, blur, sharpen,
};
use tracing::trace;

use crate::config::{EffectConfig, TimeOfDay};
use crate::geometry::Quad;
use crate::illumination::{apply_glow, apply_haze, apply_shadow_intensity, glow_sigma};
use crate::layer::FrameLayer;

/// Where a composite request currently is. Used for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStage {
    Validating,
    Matching,
    Warping,
    EdgeCompositing,
    ColorGrading,
    IlluminationEffects,
    Merging,
    VignetteAndFinalize,
    Done,
    Failed,
}

impl fmt::Display for CompositeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeStage::Validating => "validating",
            CompositeStage::Matching => "matching",
            CompositeStage::Warping => "warping",
            CompositeStage::EdgeCompositing => "edge-compositing",
            CompositeStage::ColorGrading => "color-grading",
            CompositeStage::IlluminationEffects => "illumination",
            CompositeStage::Merging => "merging",
            CompositeStage::VignetteAndFinalize => "vignette-and-finalize",
            CompositeStage::Done => "done",
            CompositeStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A pure effect over a rendered frame layer.
pub trait ImageFilter {
    /// The pipeline stage this filter belongs to.
    fn stage(&self) -> CompositeStage;
    fn apply(&self, layer: &FrameLayer) -> FrameLayer;
}

/// The effect stages a frame layer can pass through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerFilter {
    Blur { radius: f32 },
    Sharpen { amount: f32 },
    Brightness { strength: f32 },
    Contrast { strength: f32 },
    Saturation { strength: f32 },
    Temperature { strength: f32 },
    Haze { depth: f32 },
    /// `sigma` is the bloom's Gaussian sigma in pixels.
    Glow { depth: f32, sigma: f32 },
    ShadowIntensity { intensity: f32 },
}

impl ImageFilter for LayerFilter {
    fn stage(&self) -> CompositeStage {
        match self {
            LayerFilter::Haze { .. } | LayerFilter::Glow { .. } | LayerFilter::ShadowIntensity { .. } => {
                CompositeStage::IlluminationEffects
            }
            _ => CompositeStage::ColorGrading,
        }
    }

    fn apply(&self, layer: &FrameLayer) -> FrameLayer {
        let image = layer.image();
        let graded = match *self {
            LayerFilter::Blur { radius } => blur(image, radius),
            LayerFilter::Sharpen { amount } => sharpen(image, amount),
            LayerFilter::Brightness { strength } => adjust_brightness(image, strength),
            LayerFilter::Contrast { strength } => adjust_contrast(image, strength),
            LayerFilter::Saturation { strength } => adjust_saturation(image, strength),
            LayerFilter::Temperature { strength } => adjust_temperature(image, strength),
            LayerFilter::Haze { depth } => return apply_haze(layer, depth),
            LayerFilter::Glow { depth, sigma } => return apply_glow(layer, depth, sigma),
            LayerFilter::ShadowIntensity { intensity } => {
                return apply_shadow_intensity(layer, intensity);
            }
        };
        layer.clone().with_image(graded)
    }
}

/// Build the ordered filter list for one frame.
///
/// Blur and sharpen come first so they act on the antialiased layer, then
/// colour grading, then haze (day) or glow (night) on the graded creative,
/// then the contact-shadow strength. Stages that would be a no-op are left out.
/// The glow is sized from `quad`, the frame the layer was rendered for.
pub fn filters_for(time_of_day: TimeOfDay, config: &EffectConfig, quad: &Quad) -> Vec<LayerFilter> {
    let mut filters = Vec::new();
    if config.blur > 0.0 {
        filters.push(LayerFilter::Blur { radius: config.blur });
    }
    if config.sharpening > 0.0 {
        filters.push(LayerFilter::Sharpen {
            amount: config.sharpening,
        });
    }
    if config.brightness != 0.0 {
        filters.push(LayerFilter::Brightness {
            strength: config.brightness,
        });
    }
    if config.contrast != 0.0 {
        filters.push(LayerFilter::Contrast {
            strength: config.contrast,
        });
    }
    if config.saturation != 0.0 {
        filters.push(LayerFilter::Saturation {
            strength: config.saturation,
        });
    }
    if config.temperature != 0.0 {
        filters.push(LayerFilter::Temperature {
            strength: config.temperature,
        });
    }
    if config.depth_multiplier > 0.0 {
        filters.push(match time_of_day {
            TimeOfDay::Day => LayerFilter::Haze {
                depth: config.depth_multiplier,
            },
            TimeOfDay::Night => LayerFilter::Glow {
                depth: config.depth_multiplier,
                sigma: glow_sigma(quad),
            },
        });
    }
    if config.shadow_intensity > 0.0 {
        filters.push(LayerFilter::ShadowIntensity {
            intensity: config.shadow_intensity,
        });
    }
    filters
}

/// Run `filters` over `layer` in order.
pub fn apply_filters<F: ImageFilter>(layer: &FrameLayer, filters: &[F]) -> FrameLayer {
    let mut current = layer.clone();
    for (index, filter) in filters.iter().enumerate() {
        trace!(stage = %filter.stage(), filter = index);
        current = filter.apply(&current);
    }
    current
}
