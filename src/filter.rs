use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adjustments::{AdjustmentField, Adjustments};

/// Intensities at or below this are treated as "off".
const INTENSITY_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    None,
    Vivid,
    Dramatic,
    Mono,
    Noir,
    Sepia,
    Vintage,
    Fade,
    Warm,
    Cool,
    Chrome,
}

impl FilterType {
    pub const ALL: [FilterType; 11] = [
        FilterType::None,
        FilterType::Vivid,
        FilterType::Dramatic,
        FilterType::Mono,
        FilterType::Noir,
        FilterType::Sepia,
        FilterType::Vintage,
        FilterType::Fade,
        FilterType::Warm,
        FilterType::Cool,
        FilterType::Chrome,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterType::None => "Original",
            FilterType::Vivid => "Vivid",
            FilterType::Dramatic => "Dramatic",
            FilterType::Mono => "Mono",
            FilterType::Noir => "Noir",
            FilterType::Sepia => "Sepia",
            FilterType::Vintage => "Vintage",
            FilterType::Fade => "Fade",
            FilterType::Warm => "Warm",
            FilterType::Cool => "Cool",
            FilterType::Chrome => "Chrome",
        }
    }

    pub fn is_trivial(self) -> bool {
        self == FilterType::None
    }

    /// Slider values the filter contributes at full intensity.
    fn full_strength(self) -> Adjustments {
        use AdjustmentField::*;
        let base = Adjustments::default();
        match self {
            FilterType::None => base,
            FilterType::Vivid => base
                .with(Saturation, 0.4)
                .with(Contrast, 0.15)
                .with(Brightness, 0.05),
            FilterType::Dramatic => base
                .with(Contrast, 0.45)
                .with(Highlights, -0.3)
                .with(Shadows, -0.2)
                .with(Saturation, -0.1),
            FilterType::Mono => base.with(Saturation, -1.0).with(Contrast, 0.1),
            FilterType::Noir => base
                .with(Saturation, -1.0)
                .with(Contrast, 0.5)
                .with(Exposure, -0.3)
                .with(Shadows, -0.3),
            FilterType::Sepia => base
                .with(Saturation, -0.5)
                .with(Warmth, 0.5)
                .with(Contrast, 0.05),
            FilterType::Vintage => base
                .with(Brightness, 0.05)
                .with(Contrast, -0.1)
                .with(Saturation, -0.3)
                .with(Highlights, -0.15)
                .with(Shadows, 0.1)
                .with(Warmth, 0.35)
                .with(Tint, 0.05),
            FilterType::Fade => base
                .with(Contrast, -0.3)
                .with(Saturation, -0.2)
                .with(Shadows, 0.3),
            FilterType::Warm => base.with(Warmth, 0.5).with(Tint, 0.1),
            FilterType::Cool => base.with(Warmth, -0.5).with(Tint, -0.05),
            FilterType::Chrome => base
                .with(Contrast, 0.25)
                .with(Saturation, 0.2)
                .with(Highlights, 0.1)
                .with(Exposure, 0.1),
        }
    }

    /// Base adjustments derived from this filter at `intensity` (clamped to [0,1]).
    pub fn base_adjustments(self, intensity: f32) -> Adjustments {
        self.full_strength().scaled(clamp_intensity(intensity))
    }
}

fn clamp_intensity(intensity: f32) -> f32 {
    if intensity.is_finite() {
        intensity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A filter selection as committed to the session.
pub struct AppliedFilter {
    filter_type: FilterType,
    intensity: f32,
    id: Uuid,
    applied_at: SystemTime,
}

impl AppliedFilter {
    pub fn new(filter_type: FilterType, intensity: f32) -> Self {
        Self {
            filter_type,
            intensity: clamp_intensity(intensity),
            id: Uuid::new_v4(),
            applied_at: SystemTime::now(),
        }
    }

    /// Same filter instance (same id) at a different intensity.
    pub fn with_intensity(&self, intensity: f32) -> Self {
        Self {
            intensity: clamp_intensity(intensity),
            applied_at: SystemTime::now(),
            ..self.clone()
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn applied_at(&self) -> SystemTime {
        self.applied_at
    }

    pub fn is_effective(&self) -> bool {
        !self.filter_type.is_trivial() && self.intensity > INTENSITY_EPSILON
    }

    pub fn base_adjustments(&self) -> Adjustments {
        self.filter_type.base_adjustments(self.intensity)
    }
}
