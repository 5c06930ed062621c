use serde::{Deserialize, Serialize};

use crate::adjustments::Adjustments;
use crate::state::{AdjustmentSnapshot, EditState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmartResetLevel {
    /// Clear user adjustments only.
    Minimal,
    /// Clear user adjustments and cap the filter intensity.
    Moderate { filter_intensity_cap: f32 },
    /// Clear adjustments and filter.
    Complete,
}

impl SmartResetLevel {
    pub fn label(self) -> &'static str {
        match self {
            SmartResetLevel::Minimal => "Minimal",
            SmartResetLevel::Moderate { .. } => "Moderate",
            SmartResetLevel::Complete => "Complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResetKind {
    Complete,
    /// Zero base and user adjustments but keep the filter selection. The
    /// filter stays applied with no tonal contribution until its intensity
    /// or type changes, which re-derives the base from the filter.
    AdjustmentsOnly,
    FilterOnly,
    UserAdjustmentsOnly,
    Smart(SmartResetLevel),
}

impl ResetKind {
    pub fn description(self) -> String {
        match self {
            ResetKind::Complete => "Reset All".to_string(),
            ResetKind::AdjustmentsOnly => "Reset Adjustments".to_string(),
            ResetKind::FilterOnly => "Reset Filter".to_string(),
            ResetKind::UserAdjustmentsOnly => "Reset User Adjustments".to_string(),
            ResetKind::Smart(level) => format!("Smart Reset ({})", level.label()),
        }
    }

    /// State after applying this reset to `before`.
    pub fn resolve(self, before: &AdjustmentSnapshot) -> AdjustmentSnapshot {
        match self {
            ResetKind::Complete | ResetKind::Smart(SmartResetLevel::Complete) => {
                AdjustmentSnapshot::default()
            }
            ResetKind::AdjustmentsOnly => AdjustmentSnapshot {
                base: Adjustments::default(),
                user: Adjustments::default(),
                filter: before.filter.clone(),
            },
            ResetKind::FilterOnly => AdjustmentSnapshot {
                base: Adjustments::default(),
                user: before.user,
                filter: None,
            },
            ResetKind::UserAdjustmentsOnly | ResetKind::Smart(SmartResetLevel::Minimal) => {
                AdjustmentSnapshot {
                    user: Adjustments::default(),
                    ..before.clone()
                }
            }
            ResetKind::Smart(SmartResetLevel::Moderate {
                filter_intensity_cap,
            }) => {
                let filter = before.filter.as_ref().map(|f| {
                    if f.intensity() > filter_intensity_cap {
                        f.with_intensity(filter_intensity_cap)
                    } else {
                        f.clone()
                    }
                });
                let base = filter
                    .as_ref()
                    .map(|f| f.base_adjustments())
                    .unwrap_or_default();
                AdjustmentSnapshot {
                    base,
                    user: Adjustments::default(),
                    filter,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Thresholds behind `EditSession::smart_reset`. These are product tuning,
/// not invariants.
pub struct SmartResetPolicy {
    /// User adjustments count as significant when any slider exceeds this magnitude.
    pub significant_adjustment: f32,
    /// An effective filter counts as significant above this intensity.
    pub significant_filter_intensity: f32,
    /// Intensity the moderate reset caps the filter at.
    pub moderate_filter_intensity_cap: f32,
}

impl Default for SmartResetPolicy {
    fn default() -> Self {
        Self {
            significant_adjustment: 0.3,
            significant_filter_intensity: 0.2,
            moderate_filter_intensity_cap: 0.5,
        }
    }
}

impl SmartResetPolicy {
    pub fn choose(&self, state: &EditState) -> SmartResetLevel {
        let adjustments_significant =
            state.user_adjustments().max_magnitude() > self.significant_adjustment;
        let filter_significant = state
            .applied_filter()
            .is_some_and(|f| f.is_effective() && f.intensity() > self.significant_filter_intensity);

        match (adjustments_significant, filter_significant) {
            (true, true) => SmartResetLevel::Complete,
            (false, true) => SmartResetLevel::Moderate {
                filter_intensity_cap: self.moderate_filter_intensity_cap,
            },
            _ => SmartResetLevel::Minimal,
        }
    }
}
