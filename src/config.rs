use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MockupError, MockupResult};

/// Lighting condition of the template photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    #[default]
    Day,
    Night,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeOfDay::Day => f.write_str("day"),
            TimeOfDay::Night => f.write_str("night"),
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(TimeOfDay::Day),
            "night" => Ok(TimeOfDay::Night),
            other => Err(format!("unknown time of day '{other}' (expected day or night)")),
        }
    }
}

/// Frame finish of the billboard structure. Only used to key templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finish {
    #[default]
    Gold,
    Silver,
}

impl fmt::Display for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finish::Gold => f.write_str("gold"),
            Finish::Silver => f.write_str("silver"),
        }
    }
}

impl FromStr for Finish {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gold" => Ok(Finish::Gold),
            "silver" => Ok(Finish::Silver),
            other => Err(format!("unknown finish '{other}' (expected gold or silver)")),
        }
    }
}

/// Numeric parameters for one composite operation.
///
/// Colour strengths are normalised so that `0.0` leaves the creative untouched.
/// The struct is consumed by value by every stage and never mutated while a
/// composite is running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Feather radius of the frame boundary in pixels (Gaussian sigma is a third of it).
    pub edge_blur: f32,
    /// Linear supersampling factor used when rendering the warp.
    pub edge_supersample_factor: u32,
    /// Scales the night glow and the day haze.
    pub depth_multiplier: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Positive warms (towards amber), negative cools (towards blue).
    pub temperature: f32,
    pub vignette_strength: f32,
    /// Opacity of the contact shadow under the creative.
    pub shadow_intensity: f32,
    /// Unsharp-mask amount.
    pub sharpening: f32,
    /// General Gaussian blur radius applied to the creative.
    pub blur: f32,
    /// Offset of the contact shadow in pixels (down and to the right).
    pub shadow_offset: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            edge_blur: 8.0,
            edge_supersample_factor: 4,
            depth_multiplier: 1.0,
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            temperature: 0.0,
            vignette_strength: 0.2,
            shadow_intensity: 0.35,
            sharpening: 0.0,
            blur: 0.0,
            shadow_offset: 3.0,
        }
    }
}

const MAX_RADIUS: f32 = 64.0;
const MAX_SUPERSAMPLE: u32 = 8;

impl EffectConfig {
    /// A config that renders hard, unlit edges: no feathering, no supersampling,
    /// no shadow, no vignette and no glow or haze.
    pub fn flat() -> Self {
        Self {
            edge_blur: 0.0,
            edge_supersample_factor: 1,
            depth_multiplier: 0.0,
            vignette_strength: 0.0,
            shadow_intensity: 0.0,
            ..Self::default()
        }
    }

    pub fn with_edge_blur(mut self, edge_blur: f32) -> Self {
        self.edge_blur = edge_blur;
        self
    }

    pub fn with_supersample_factor(mut self, factor: u32) -> Self {
        self.edge_supersample_factor = factor;
        self
    }

    pub fn with_depth_multiplier(mut self, depth_multiplier: f32) -> Self {
        self.depth_multiplier = depth_multiplier;
        self
    }

    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_contrast(mut self, contrast: f32) -> Self {
        self.contrast = contrast;
        self
    }

    pub fn with_saturation(mut self, saturation: f32) -> Self {
        self.saturation = saturation;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_vignette_strength(mut self, vignette_strength: f32) -> Self {
        self.vignette_strength = vignette_strength;
        self
    }

    pub fn with_shadow_intensity(mut self, shadow_intensity: f32) -> Self {
        self.shadow_intensity = shadow_intensity;
        self
    }

    pub fn with_sharpening(mut self, sharpening: f32) -> Self {
        self.sharpening = sharpening;
        self
    }

    pub fn with_blur(mut self, blur: f32) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_shadow_offset(mut self, shadow_offset: f32) -> Self {
        self.shadow_offset = shadow_offset;
        self
    }

    /// Return a new config with every field set in `overrides` replaced.
    pub fn with_overrides(&self, overrides: &EffectOverrides) -> Self {
        let mut out = *self;
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(v) = overrides.$field { out.$field = v; })*
            };
        }
        apply!(
            edge_blur,
            edge_supersample_factor,
            depth_multiplier,
            brightness,
            contrast,
            saturation,
            temperature,
            vignette_strength,
            shadow_intensity,
            sharpening,
            blur,
            shadow_offset
        );
        out
    }

    /// Check every parameter against its documented range.
    pub fn validate(&self) -> MockupResult<()> {
        check_range("edge_blur", self.edge_blur, 0.0, MAX_RADIUS)?;
        if !(1..=MAX_SUPERSAMPLE).contains(&self.edge_supersample_factor) {
            return Err(MockupError::InvalidEffectConfig {
                field: "edge_supersample_factor",
                value: f64::from(self.edge_supersample_factor),
                reason: "must be between 1 and 8",
            });
        }
        check_range("depth_multiplier", self.depth_multiplier, 0.0, MAX_RADIUS)?;
        check_range("brightness", self.brightness, -1.0, 1.0)?;
        check_range("contrast", self.contrast, -1.0, 1.0)?;
        check_range("saturation", self.saturation, -1.0, 1.0)?;
        check_range("temperature", self.temperature, -1.0, 1.0)?;
        check_range("vignette_strength", self.vignette_strength, 0.0, 1.0)?;
        check_range("shadow_intensity", self.shadow_intensity, 0.0, 1.0)?;
        check_range("sharpening", self.sharpening, 0.0, MAX_RADIUS)?;
        check_range("blur", self.blur, 0.0, MAX_RADIUS)?;
        check_range("shadow_offset", self.shadow_offset, 0.0, MAX_RADIUS)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> MockupResult<()> {
    if !value.is_finite() {
        return Err(MockupError::InvalidEffectConfig {
            field,
            value: f64::from(value),
            reason: "must be finite",
        });
    }
    if value < min || value > max {
        let reason = if min < 0.0 {
            "must be between -1 and 1"
        } else if max <= 1.0 {
            "must be between 0 and 1"
        } else {
            "must be between 0 and 64"
        };
        return Err(MockupError::InvalidEffectConfig {
            field,
            value: f64::from(value),
            reason,
        });
    }
    Ok(())
}

/// Partial [`EffectConfig`] scoped to a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_blur: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_supersample_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_multiplier: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vignette_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpening: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_offset: Option<f32>,
}

impl EffectOverrides {
    pub fn is_empty(&self) -> bool {
        *self == EffectOverrides::default()
    }
}
