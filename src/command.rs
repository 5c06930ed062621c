//! Reversible edit commands.
//!
//! A command records the before and after values of exactly the fields it
//! governs, by value, so it can be applied and reversed regardless of what
//! happened to the session in between. Commands are never mutated after
//! creation; coalescing produces a new command.

use std::mem::size_of;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::adjustments::Adjustments;
use crate::crop::CropRotateState;
use crate::filter::AppliedFilter;
use crate::reset::ResetKind;
use crate::state::{AdjustmentSnapshot, EditState};

/// Fixed per-command bookkeeping (id, timestamp, enum tag, allocation).
const COMMAND_OVERHEAD: usize = 96;
/// Extra bookkeeping for a batch on top of its children.
const BATCH_OVERHEAD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
/// Coarse command kind, used for statistics.
pub enum CommandCategory {
    Adjustment,
    Filter,
    CropRotate,
    Reset,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which of the four filter transitions a filter command represents.
/// Execution is identical for all of them; only the description differs.
pub enum FilterOperation {
    Apply,
    Remove,
    Change,
    Intensity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Adjustment {
        previous_user: Adjustments,
        new_user: Adjustments,
        /// Present when the base values change alongside the user values.
        base: Option<(Adjustments, Adjustments)>,
    },
    Filter {
        operation: FilterOperation,
        previous: Option<AppliedFilter>,
        new: Option<AppliedFilter>,
        previous_base: Adjustments,
        new_base: Adjustments,
    },
    CropRotate {
        previous: CropRotateState,
        new: CropRotateState,
    },
    Reset {
        kind: ResetKind,
        before: AdjustmentSnapshot,
        after: AdjustmentSnapshot,
    },
    /// Sub-commands applied in order and reversed in reverse order.
    Batch {
        description: String,
        commands: Vec<EditCommand>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditCommand {
    id: Uuid,
    created_at: Instant,
    kind: CommandKind,
}

impl EditCommand {
    fn from_kind(kind: CommandKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            kind,
        }
    }

    pub fn adjustment(previous_user: Adjustments, new_user: Adjustments) -> Self {
        Self::from_kind(CommandKind::Adjustment {
            previous_user,
            new_user,
            base: None,
        })
    }

    pub fn adjustment_with_base(
        previous_user: Adjustments,
        new_user: Adjustments,
        previous_base: Adjustments,
        new_base: Adjustments,
    ) -> Self {
        Self::from_kind(CommandKind::Adjustment {
            previous_user,
            new_user,
            base: Some((previous_base, new_base)),
        })
    }

    /// Filter transition; the operation is inferred from which side is absent
    /// and whether the filter type changed.
    pub fn filter(
        previous: Option<AppliedFilter>,
        new: Option<AppliedFilter>,
        previous_base: Adjustments,
        new_base: Adjustments,
    ) -> Self {
        let operation = match (&previous, &new) {
            (None, Some(_)) => FilterOperation::Apply,
            (Some(p), Some(n)) if p.filter_type() == n.filter_type() => FilterOperation::Intensity,
            (Some(_), Some(_)) => FilterOperation::Change,
            (_, None) => FilterOperation::Remove,
        };
        Self::from_kind(CommandKind::Filter {
            operation,
            previous,
            new,
            previous_base,
            new_base,
        })
    }

    pub fn crop_rotate(previous: CropRotateState, new: CropRotateState) -> Self {
        Self::from_kind(CommandKind::CropRotate { previous, new })
    }

    /// Reset captured against the current committed state.
    pub fn reset(kind: ResetKind, state: &EditState) -> Self {
        let before = state.snapshot();
        let after = kind.resolve(&before);
        Self::from_kind(CommandKind::Reset {
            kind,
            before,
            after,
        })
    }

    pub fn batch(description: impl Into<String>, commands: Vec<EditCommand>) -> Self {
        Self::from_kind(CommandKind::Batch {
            description: description.into(),
            commands,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn category(&self) -> CommandCategory {
        match self.kind {
            CommandKind::Adjustment { .. } => CommandCategory::Adjustment,
            CommandKind::Filter { .. } => CommandCategory::Filter,
            CommandKind::CropRotate { .. } => CommandCategory::CropRotate,
            CommandKind::Reset { .. } => CommandCategory::Reset,
            CommandKind::Batch { .. } => CommandCategory::Batch,
        }
    }

    /// True when applying the command would leave the state unchanged.
    pub fn is_noop(&self) -> bool {
        match &self.kind {
            CommandKind::Adjustment {
                previous_user,
                new_user,
                base,
            } => previous_user == new_user && base.as_ref().is_none_or(|(p, n)| p == n),
            CommandKind::Filter {
                previous,
                new,
                previous_base,
                new_base,
                ..
            } => previous == new && previous_base == new_base,
            CommandKind::CropRotate { previous, new } => previous == new,
            CommandKind::Reset { before, after, .. } => before == after,
            CommandKind::Batch { commands, .. } => commands.iter().all(EditCommand::is_noop),
        }
    }

    pub fn apply(&self, state: &mut EditState) {
        match &self.kind {
            CommandKind::Adjustment { new_user, base, .. } => {
                if let Some((_, new_base)) = base {
                    state.set_base_adjustments_directly(*new_base);
                }
                state.set_user_adjustments_directly(*new_user);
            }
            CommandKind::Filter { new, new_base, .. } => {
                state.set_filter_directly(new.clone(), *new_base);
            }
            CommandKind::CropRotate { new, .. } => {
                state.set_crop_rotate_directly(new.clone());
            }
            CommandKind::Reset { after, .. } => {
                state.restore_snapshot_directly(after);
            }
            CommandKind::Batch { commands, .. } => {
                for command in commands {
                    command.apply(state);
                }
            }
        }
    }

    pub fn reverse(&self, state: &mut EditState) {
        match &self.kind {
            CommandKind::Adjustment {
                previous_user,
                base,
                ..
            } => {
                if let Some((previous_base, _)) = base {
                    state.set_base_adjustments_directly(*previous_base);
                }
                state.set_user_adjustments_directly(*previous_user);
            }
            CommandKind::Filter {
                previous,
                previous_base,
                ..
            } => {
                state.set_filter_directly(previous.clone(), *previous_base);
            }
            CommandKind::CropRotate { previous, .. } => {
                state.set_crop_rotate_directly(previous.clone());
            }
            CommandKind::Reset { before, .. } => {
                state.restore_snapshot_directly(before);
            }
            CommandKind::Batch { commands, .. } => {
                for command in commands.iter().rev() {
                    command.reverse(state);
                }
            }
        }
    }

    pub fn description(&self) -> String {
        match &self.kind {
            CommandKind::Adjustment {
                previous_user,
                new_user,
                ..
            } => {
                let changed = previous_user.changed_fields(new_user);
                match changed.as_slice() {
                    [] => "Adjustments".to_string(),
                    [field] => format!("Adjust {}", field.label()),
                    fields => format!("Adjust {} Settings", fields.len()),
                }
            }
            CommandKind::Filter {
                operation,
                previous,
                new,
                ..
            } => {
                let name = |f: &Option<AppliedFilter>| {
                    f.as_ref()
                        .map(|f| f.filter_type().name())
                        .unwrap_or("Filter")
                };
                match operation {
                    FilterOperation::Apply => format!("Apply {} Filter", name(new)),
                    FilterOperation::Remove => format!("Remove {} Filter", name(previous)),
                    FilterOperation::Change => format!("Change Filter to {}", name(new)),
                    FilterOperation::Intensity => {
                        let pct = new.as_ref().map(|f| f.intensity()).unwrap_or(0.0) * 100.0;
                        format!("{} Intensity {}%", name(new), pct.round() as i32)
                    }
                }
            }
            CommandKind::CropRotate { previous, new } => new.describe_change_from(previous),
            CommandKind::Reset { kind, .. } => kind.description(),
            CommandKind::Batch { description, .. } => description.clone(),
        }
    }

    /// Estimated bytes retained by this command. Used for budgeting only.
    pub fn memory_cost(&self) -> usize {
        match &self.kind {
            CommandKind::Adjustment { base, .. } => {
                let pairs = if base.is_some() { 2 } else { 1 };
                COMMAND_OVERHEAD + pairs * 2 * size_of::<Adjustments>()
            }
            CommandKind::Filter { .. } => {
                COMMAND_OVERHEAD
                    + 2 * size_of::<Option<AppliedFilter>>()
                    + 2 * size_of::<Adjustments>()
            }
            CommandKind::CropRotate { .. } => COMMAND_OVERHEAD + 2 * size_of::<CropRotateState>(),
            CommandKind::Reset { .. } => COMMAND_OVERHEAD + 2 * size_of::<AdjustmentSnapshot>(),
            CommandKind::Batch {
                description,
                commands,
            } => {
                BATCH_OVERHEAD
                    + description.len()
                    + commands.iter().map(EditCommand::memory_cost).sum::<usize>()
            }
        }
    }

    /// Merge `next` into `self` when both are crop/rotate commands forming one
    /// continuous gesture: `next` starts where `self` ended and was created
    /// within `window` of it. The merged command keeps `self`'s id and takes
    /// `next`'s timestamp so a run of nudges keeps merging.
    pub fn merge(&self, next: &EditCommand, window: Duration) -> Option<EditCommand> {
        let (
            CommandKind::CropRotate { previous, new },
            CommandKind::CropRotate {
                previous: next_previous,
                new: next_new,
            },
        ) = (&self.kind, &next.kind)
        else {
            return None;
        };
        if new != next_previous {
            return None;
        }
        if next.created_at.saturating_duration_since(self.created_at) > window {
            return None;
        }
        Some(EditCommand {
            id: self.id,
            created_at: next.created_at,
            kind: CommandKind::CropRotate {
                previous: previous.clone(),
                new: next_new.clone(),
            },
        })
    }
}
