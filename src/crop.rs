use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Smallest width/height a crop rectangle may shrink to.
pub const MIN_CROP_EXTENT: f32 = 0.01;
const GEOMETRY_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Normalized rectangle in image coordinates (0.0–1.0 on both axes).
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub const FULL: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
        .normalized()
    }

    /// Clamp into the unit square with positive extent. Size wins over origin:
    /// the extent is clamped first, then the origin is pulled back inside.
    pub fn normalized(self) -> Self {
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let width = finite_or(self.width, 1.0).clamp(MIN_CROP_EXTENT, 1.0);
        let height = finite_or(self.height, 1.0).clamp(MIN_CROP_EXTENT, 1.0);
        let x = finite_or(self.x, 0.0).clamp(0.0, 1.0 - width);
        let y = finite_or(self.y, 0.0).clamp(0.0, 1.0 - height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_full(&self) -> bool {
        self.x.abs() < GEOMETRY_EPSILON
            && self.y.abs() < GEOMETRY_EPSILON
            && (self.width - 1.0).abs() < GEOMETRY_EPSILON
            && (self.height - 1.0).abs() < GEOMETRY_EPSILON
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Crop aspect-ratio constraint. The constraint is advisory for crop handles;
/// the stored rectangle is not reshaped to match it.
pub enum AspectRatio {
    Square,
    FourThree,
    ThreeTwo,
    SixteenNine,
    Custom { width: f32, height: f32 },
}

impl AspectRatio {
    pub fn ratio(self) -> f32 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::FourThree => 4.0 / 3.0,
            AspectRatio::ThreeTwo => 3.0 / 2.0,
            AspectRatio::SixteenNine => 16.0 / 9.0,
            AspectRatio::Custom { width, height } => {
                if height > 0.0 && width > 0.0 {
                    width / height
                } else {
                    1.0
                }
            }
        }
    }

    pub fn label(self) -> String {
        match self {
            AspectRatio::Square => "1:1".to_string(),
            AspectRatio::FourThree => "4:3".to_string(),
            AspectRatio::ThreeTwo => "3:2".to_string(),
            AspectRatio::SixteenNine => "16:9".to_string(),
            AspectRatio::Custom { width, height } => format!("{}:{}", width, height),
        }
    }
}

/// Wrap an angle in radians into (−π, π]. Non-finite input maps to zero.
pub fn normalize_rotation(radians: f32) -> f32 {
    if !radians.is_finite() {
        return 0.0;
    }
    let wrapped = radians.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Geometry edits: crop rectangle, rotation, flips and an optional aspect
/// constraint. Built only through normalizing constructors, so the rect is
/// always inside the unit square and rotation is always in (−π, π].
pub struct CropRotateState {
    crop: NormalizedRect,
    rotation: f32,
    flip_horizontal: bool,
    flip_vertical: bool,
    aspect_ratio: Option<AspectRatio>,
}

impl CropRotateState {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn crop(&self) -> NormalizedRect {
        self.crop
    }

    /// Rotation in radians, within (−π, π].
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation.to_degrees()
    }

    pub fn flip_horizontal(&self) -> bool {
        self.flip_horizontal
    }

    pub fn flip_vertical(&self) -> bool {
        self.flip_vertical
    }

    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.aspect_ratio
    }

    pub fn with_crop(mut self, crop: NormalizedRect) -> Self {
        self.crop = crop.normalized();
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = normalize_rotation(radians);
        self
    }

    pub fn rotated_by(self, delta: f32) -> Self {
        let rotation = self.rotation + delta;
        self.with_rotation(rotation)
    }

    pub fn with_flip_horizontal(mut self, flip: bool) -> Self {
        self.flip_horizontal = flip;
        self
    }

    pub fn with_flip_vertical(mut self, flip: bool) -> Self {
        self.flip_vertical = flip;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn is_identity(&self) -> bool {
        self.crop.is_full()
            && self.rotation.abs() < GEOMETRY_EPSILON
            && !self.flip_horizontal
            && !self.flip_vertical
            && self.aspect_ratio.is_none()
    }

    pub fn has_transformation(&self) -> bool {
        !self.is_identity()
    }

    /// Human-readable summary of what changed from `previous` to `self`.
    /// Multiple changes are joined with ", ".
    pub fn describe_change_from(&self, previous: &CropRotateState) -> String {
        let mut parts = Vec::new();

        if self.crop != previous.crop {
            if previous.crop.is_full() {
                parts.push("Crop".to_string());
            } else {
                parts.push("Adjust Crop".to_string());
            }
        }

        let delta = normalize_rotation(self.rotation - previous.rotation);
        if delta.abs() >= GEOMETRY_EPSILON {
            parts.push(format!("Rotate {:+}°", delta.to_degrees().round() as i32));
        }

        if self.flip_horizontal != previous.flip_horizontal {
            parts.push("Flip Horizontal".to_string());
        }
        if self.flip_vertical != previous.flip_vertical {
            parts.push("Flip Vertical".to_string());
        }

        if self.aspect_ratio != previous.aspect_ratio {
            match self.aspect_ratio {
                Some(ratio) => parts.push(format!("Aspect Ratio {}", ratio.label())),
                None => parts.push("Free Aspect Ratio".to_string()),
            }
        }

        if parts.is_empty() {
            "Crop & Rotate".to_string()
        } else {
            parts.join(", ")
        }
    }
}
