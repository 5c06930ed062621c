use crate::adjustments::Adjustments;
use crate::crop::CropRotateState;
use crate::filter::AppliedFilter;

#[derive(Debug, Clone, PartialEq, Default)]
/// The slider/filter half of the edit state, captured by reset commands.
pub struct AdjustmentSnapshot {
    pub base: Adjustments,
    pub user: Adjustments,
    pub filter: Option<AppliedFilter>,
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Committed edit parameters for the loaded image.
///
/// Read access is public. Writes go through the `*_directly` setters, which are
/// crate-private and called only from command `apply`/`reverse`, so every
/// committed change outside of staging is a recorded command.
pub struct EditState {
    base_adjustments: Adjustments,
    user_adjustments: Adjustments,
    applied_filter: Option<AppliedFilter>,
    crop_rotate: CropRotateState,
}

impl EditState {
    /// Adjustments derived from the active filter and its intensity.
    pub fn base_adjustments(&self) -> &Adjustments {
        &self.base_adjustments
    }

    /// Adjustments set by hand, additive on top of the base.
    pub fn user_adjustments(&self) -> &Adjustments {
        &self.user_adjustments
    }

    pub fn applied_filter(&self) -> Option<&AppliedFilter> {
        self.applied_filter.as_ref()
    }

    pub fn crop_rotate(&self) -> &CropRotateState {
        &self.crop_rotate
    }

    pub fn effective_adjustments(&self) -> Adjustments {
        self.base_adjustments.combined(&self.user_adjustments)
    }

    pub fn has_edits(&self) -> bool {
        !self.base_adjustments.is_neutral()
            || !self.user_adjustments.is_neutral()
            || self.applied_filter.as_ref().is_some_and(|f| f.is_effective())
            || self.crop_rotate.has_transformation()
    }

    pub fn snapshot(&self) -> AdjustmentSnapshot {
        AdjustmentSnapshot {
            base: self.base_adjustments,
            user: self.user_adjustments,
            filter: self.applied_filter.clone(),
        }
    }

    pub(crate) fn set_user_adjustments_directly(&mut self, user: Adjustments) {
        self.user_adjustments = user;
    }

    pub(crate) fn set_base_adjustments_directly(&mut self, base: Adjustments) {
        self.base_adjustments = base;
    }

    pub(crate) fn set_filter_directly(&mut self, filter: Option<AppliedFilter>, base: Adjustments) {
        self.applied_filter = filter;
        self.base_adjustments = base;
    }

    pub(crate) fn set_crop_rotate_directly(&mut self, crop_rotate: CropRotateState) {
        self.crop_rotate = crop_rotate;
    }

    pub(crate) fn restore_snapshot_directly(&mut self, snapshot: &AdjustmentSnapshot) {
        self.base_adjustments = snapshot.base;
        self.user_adjustments = snapshot.user;
        self.applied_filter = snapshot.filter.clone();
    }
}
