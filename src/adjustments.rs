use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Values closer to zero than this count as neutral.
pub const NEUTRAL_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// One of the eight tonal/color sliders.
pub enum AdjustmentField {
    Brightness,
    Contrast,
    Saturation,
    Exposure,
    Highlights,
    Shadows,
    Warmth,
    Tint,
}

impl AdjustmentField {
    pub const COUNT: usize = 8;

    pub const ALL: [AdjustmentField; Self::COUNT] = [
        AdjustmentField::Brightness,
        AdjustmentField::Contrast,
        AdjustmentField::Saturation,
        AdjustmentField::Exposure,
        AdjustmentField::Highlights,
        AdjustmentField::Shadows,
        AdjustmentField::Warmth,
        AdjustmentField::Tint,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AdjustmentField::Brightness => "Brightness",
            AdjustmentField::Contrast => "Contrast",
            AdjustmentField::Saturation => "Saturation",
            AdjustmentField::Exposure => "Exposure",
            AdjustmentField::Highlights => "Highlights",
            AdjustmentField::Shadows => "Shadows",
            AdjustmentField::Warmth => "Warmth",
            AdjustmentField::Tint => "Tint",
        }
    }

    /// Declared slider range. Exposure is in stops, everything else is unitless.
    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            AdjustmentField::Exposure => -2.0..=2.0,
            _ => -1.0..=1.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn clamp(self, value: f32) -> f32 {
        if !value.is_finite() {
            return 0.0;
        }
        let range = self.range();
        value.clamp(*range.start(), *range.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<AdjustmentField, f32>",
    into = "BTreeMap<AdjustmentField, f32>"
)]
/// A full set of slider values. Every write is clamped to the field's range,
/// so an `Adjustments` value is always within bounds.
pub struct Adjustments {
    values: [f32; AdjustmentField::COUNT],
}

impl Adjustments {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn get(&self, field: AdjustmentField) -> f32 {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: AdjustmentField, value: f32) {
        self.values[field.index()] = field.clamp(value);
    }

    /// Builder-style `set`.
    pub fn with(mut self, field: AdjustmentField, value: f32) -> Self {
        self.set(field, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (AdjustmentField, f32)> + '_ {
        AdjustmentField::ALL.iter().map(|&f| (f, self.get(f)))
    }

    pub fn is_neutral(&self) -> bool {
        self.values.iter().all(|v| v.abs() < NEUTRAL_EPSILON)
    }

    /// Element-wise sum, clamped per field.
    pub fn combined(&self, other: &Adjustments) -> Adjustments {
        let mut out = Adjustments::default();
        for field in AdjustmentField::ALL {
            out.set(field, self.get(field) + other.get(field));
        }
        out
    }

    pub fn scaled(&self, factor: f32) -> Adjustments {
        let mut out = Adjustments::default();
        for field in AdjustmentField::ALL {
            out.set(field, self.get(field) * factor);
        }
        out
    }

    /// Largest absolute slider value.
    pub fn max_magnitude(&self) -> f32 {
        self.values.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()))
    }

    /// Fields whose value differs between `self` and `other`.
    pub fn changed_fields(&self, other: &Adjustments) -> Vec<AdjustmentField> {
        AdjustmentField::ALL
            .into_iter()
            .filter(|&f| (self.get(f) - other.get(f)).abs() >= NEUTRAL_EPSILON)
            .collect()
    }
}

impl From<BTreeMap<AdjustmentField, f32>> for Adjustments {
    fn from(map: BTreeMap<AdjustmentField, f32>) -> Self {
        let mut out = Adjustments::default();
        for (field, value) in map {
            out.set(field, value);
        }
        out
    }
}

impl From<Adjustments> for BTreeMap<AdjustmentField, f32> {
    fn from(adjustments: Adjustments) -> Self {
        adjustments.iter().filter(|(_, v)| *v != 0.0).collect()
    }
}
