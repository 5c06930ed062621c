//! Command-based undo/redo history with count and memory budgets.
//!
//! - `undo_stack`: applied commands, oldest at the front
//! - `redo_stack`: undone commands, most recent at the end
//!
//! Adding a command clears the redo stack (no branching redo). When either
//! budget is exceeded the oldest applied commands are dropped without being
//! reversed, so history past that point is gone for good.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::command::{CommandCategory, EditCommand};
use crate::state::EditState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// When false, commands are still applied but nothing is recorded.
    pub enabled: bool,
    pub max_commands: usize,
    pub max_memory_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_commands: 100,
            max_memory_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
/// Aggregate history usage.
pub struct HistoryStatistics {
    pub total_commands_added: usize,
    pub undo_operations: usize,
    pub redo_operations: usize,
    pub pruned_commands: usize,
    pub undo_available: usize,
    pub redo_available: usize,
    pub memory_usage_bytes: usize,
    pub commands_by_category: BTreeMap<CommandCategory, usize>,
    /// Undo operations per redo operation; equals the undo count when nothing was redone.
    pub undo_redo_ratio: f64,
    pub commands_per_minute: f64,
}

#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<EditCommand>,
    redo_stack: Vec<EditCommand>,
    config: HistoryConfig,
    memory_usage: usize,
    total_added: usize,
    undo_operations: usize,
    redo_operations: usize,
    pruned: usize,
    truncated: bool,
    by_category: BTreeMap<CommandCategory, usize>,
    created_at: Instant,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryManager {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            config,
            memory_usage: 0,
            total_added: 0,
            undo_operations: 0,
            redo_operations: 0,
            pruned: 0,
            truncated: false,
            by_category: BTreeMap::new(),
            created_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Apply `command` to `state` and record it.
    pub fn add(&mut self, command: EditCommand, state: &mut EditState) {
        command.apply(state);
        self.push(command);
    }

    /// Record an already-applied command. Clears the redo stack and prunes.
    pub fn push(&mut self, command: EditCommand) {
        if !self.config.enabled {
            tracing::trace!(description = %command.description(), "History disabled, not recording");
            return;
        }

        for dropped in self.redo_stack.drain(..) {
            self.memory_usage = self.memory_usage.saturating_sub(dropped.memory_cost());
        }

        self.total_added += 1;
        *self.by_category.entry(command.category()).or_insert(0) += 1;
        self.memory_usage += command.memory_cost();
        tracing::debug!(
            description = %command.description(),
            undo_depth = self.undo_stack.len() + 1,
            "History entry pushed"
        );
        self.undo_stack.push_back(command);

        self.prune();
    }

    /// Apply `command` and fold it into the most recent entry when the two
    /// merge (see [`EditCommand::merge`]). A merge that nets out to no change
    /// removes the entry. Returns true when merged.
    pub fn add_or_merge(
        &mut self,
        command: EditCommand,
        state: &mut EditState,
        window: Duration,
    ) -> bool {
        command.apply(state);
        if !self.config.enabled || !self.redo_stack.is_empty() {
            self.push(command);
            return false;
        }

        let merged = self
            .undo_stack
            .back()
            .and_then(|last| last.merge(&command, window));
        let Some(merged) = merged else {
            self.push(command);
            return false;
        };

        if let Some(replaced) = self.undo_stack.pop_back() {
            self.memory_usage = self.memory_usage.saturating_sub(replaced.memory_cost());
        }
        if merged.is_noop() {
            tracing::debug!("Merged entry cancels out, dropping it");
        } else {
            tracing::debug!(description = %merged.description(), "History entry merged");
            self.memory_usage += merged.memory_cost();
            self.undo_stack.push_back(merged);
        }
        true
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.config.max_commands
            || (self.memory_usage > self.config.max_memory_bytes && self.undo_stack.len() > 1)
        {
            let Some(oldest) = self.undo_stack.pop_front() else {
                break;
            };
            self.memory_usage = self.memory_usage.saturating_sub(oldest.memory_cost());
            self.pruned += 1;
            self.truncated = true;
            tracing::debug!(
                description = %oldest.description(),
                memory_usage = self.memory_usage,
                "History entry pruned"
            );
        }
    }

    /// Reverse the most recent command. Returns false when there is nothing to undo.
    pub fn undo(&mut self, state: &mut EditState) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(command) = self.undo_stack.pop_back() else {
            return false;
        };
        command.reverse(state);
        tracing::debug!(
            description = %command.description(),
            undo_remaining = self.undo_stack.len(),
            "Undo"
        );
        self.redo_stack.push(command);
        self.undo_operations += 1;
        true
    }

    /// Re-apply the most recently undone command. Returns false when there is nothing to redo.
    pub fn redo(&mut self, state: &mut EditState) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(command) = self.redo_stack.pop() else {
            return false;
        };
        command.apply(state);
        tracing::debug!(
            description = %command.description(),
            redo_remaining = self.redo_stack.len(),
            "Redo"
        );
        self.undo_stack.push_back(command);
        self.redo_operations += 1;
        true
    }

    /// Step to `position` (number of applied commands) one undo/redo at a time.
    /// Returns the number of steps taken.
    pub fn jump_to(&mut self, position: usize, state: &mut EditState) -> usize {
        let mut steps = 0;
        while self.position() > position && self.undo(state) {
            steps += 1;
        }
        while self.position() < position && self.redo(state) {
            steps += 1;
        }
        steps
    }

    /// Drop both stacks. Does not touch the edit state.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_usage = 0;
        self.truncated = false;
        tracing::debug!("History cleared");
    }

    pub fn can_undo(&self) -> bool {
        self.config.enabled && !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.config.enabled && !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(EditCommand::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(EditCommand::description)
    }

    /// Applied commands currently retained.
    pub fn command_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Current position in history: the number of applied commands.
    pub fn position(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn pruned_count(&self) -> usize {
        self.pruned
    }

    /// True once pruning has discarded entries since the last `clear`, i.e.
    /// undoing everything will no longer reach the original state.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Applied commands, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &EditCommand> {
        self.undo_stack.iter()
    }

    pub fn statistics(&self) -> HistoryStatistics {
        let minutes = self.created_at.elapsed().as_secs_f64() / 60.0;
        let commands_per_minute = if minutes > 0.0 {
            self.total_added as f64 / minutes
        } else {
            0.0
        };
        HistoryStatistics {
            total_commands_added: self.total_added,
            undo_operations: self.undo_operations,
            redo_operations: self.redo_operations,
            pruned_commands: self.pruned,
            undo_available: self.undo_stack.len(),
            redo_available: self.redo_stack.len(),
            memory_usage_bytes: self.memory_usage,
            commands_by_category: self.by_category.clone(),
            undo_redo_ratio: self.undo_operations as f64 / self.redo_operations.max(1) as f64,
            commands_per_minute,
        }
    }
}
