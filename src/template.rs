//! Background photographs and the billboard frames marked on them.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::{EffectConfig, EffectOverrides, Finish, TimeOfDay};
use crate::geometry::{PixelBounds, Quad};
use crate::{MockupError, MockupResult};

/// One billboard face in the background photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Corners in top-left, top-right, bottom-right, bottom-left order.
    pub points: Quad,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_overrides: Option<EffectOverrides>,
}

impl Frame {
    pub fn new(points: Quad) -> Self {
        Self {
            points,
            effect_overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: EffectOverrides) -> Self {
        self.effect_overrides = Some(overrides);
        self
    }

    pub fn quad(&self) -> &Quad {
        &self.points
    }

    /// Integer bounding box of the quad clipped to a `width`×`height` photo.
    pub fn bounds(&self, width: u32, height: u32) -> PixelBounds {
        self.points.bounds(0, width, height)
    }

    /// The request config with this frame's overrides applied.
    pub fn effective_config(&self, base: &EffectConfig) -> EffectConfig {
        match &self.effect_overrides {
            Some(overrides) => base.with_overrides(overrides),
            None => *base,
        }
    }
}

/// A background photo with its frames, keyed by location and lighting.
#[derive(Debug, Clone)]
pub struct MockupTemplate {
    pub location_key: String,
    pub time_of_day: TimeOfDay,
    pub finish: Finish,
    pub background: RgbaImage,
    pub frames: Vec<Frame>,
}

impl MockupTemplate {
    pub fn new(location_key: impl Into<String>, background: RgbaImage, frames: Vec<Frame>) -> Self {
        Self {
            location_key: location_key.into(),
            time_of_day: TimeOfDay::default(),
            finish: Finish::default(),
            background,
            frames,
        }
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = time_of_day;
        self
    }

    pub fn with_finish(mut self, finish: Finish) -> Self {
        self.finish = finish;
        self
    }

    /// Check that there is at least one frame, that every frame is a usable
    /// quadrilateral and that each one shows at least partly on the photo.
    pub fn validate(&self) -> MockupResult<()> {
        if self.frames.is_empty() {
            return Err(MockupError::EmptyTemplate);
        }
        let (w, h) = self.background.dimensions();
        if w == 0 || h == 0 {
            return Err(MockupError::compositing(format!(
                "background photo {w}x{h} has no area"
            )));
        }
        for (index, frame) in self.frames.iter().enumerate() {
            frame
                .points
                .validate()
                .map_err(|e| MockupError::geometry(index, e))?;
            if frame.bounds(w, h).is_empty() {
                return Err(MockupError::compositing(format!(
                    "frame {index} lies entirely outside the {w}x{h} background"
                )));
            }
        }
        Ok(())
    }
}

/// JSON description of a template. The background is referenced by path and
/// decoded by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub location_key: String,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub finish: Finish,
    pub background: String,
    pub frames: Vec<Frame>,
}

impl TemplateManifest {
    pub fn from_json_str(json: &str) -> MockupResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> MockupResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn into_template(self, background: RgbaImage) -> MockupTemplate {
        MockupTemplate {
            location_key: self.location_key,
            time_of_day: self.time_of_day,
            finish: self.finish,
            background,
            frames: self.frames,
        }
    }
}
