//! The editing session: committed state, gesture staging, history and the
//! preview pipeline for one loaded image.
//!
//! A session has a single owner. Every committed change goes through an
//! [`EditCommand`] recorded by the [`HistoryManager`]; staging (slider drags,
//! crop handle drags) only touches provisional values until committed.
//! Preview renders run on a background worker; results come back through
//! [`EditSession::poll`] and superseded renders are discarded.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;

use image::DynamicImage;
use serde::Serialize;

use crate::adjustments::{AdjustmentField, Adjustments};
use crate::command::EditCommand;
use crate::config::{Preset, SessionConfig};
use crate::crop::CropRotateState;
use crate::error::SessionError;
use crate::filter::{AppliedFilter, FilterType};
use crate::history::{HistoryManager, HistoryStatistics};
use crate::operations::{EditOperation, EditOperationKind, OperationLog};
use crate::processing::{CpuProcessor, ExportFormat, ImageProcessor};
use crate::render::{PreviewRenderer, RenderJob, RenderOutcome};
use crate::reset::ResetKind;
use crate::state::EditState;

/// Intensity changes smaller than this are treated as no change.
const INTENSITY_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessingState {
    Idle,
    Processing { progress: f32, label: String },
    Completed,
    Failed { error: String },
}

impl ProcessingState {
    pub fn is_processing(&self) -> bool {
        matches!(self, ProcessingState::Processing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// What a [`SessionEvent`] is about.
pub enum SessionChange {
    ImageLoaded,
    /// Committed state changed (edit, reset, undo, redo).
    Edit,
    /// Staged values changed; committed state did not.
    Staging,
    History,
    Processing,
    PreviewReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    /// Strictly increasing per session.
    pub version: u64,
    pub change: SessionChange,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatistics {
    pub duration_secs: f64,
    pub operations_performed: usize,
    pub total_commands: usize,
    pub history_position: usize,
    pub memory_usage_bytes: usize,
    pub undo_operations: usize,
    pub redo_operations: usize,
    pub history_truncated: bool,
    pub has_edits: bool,
}

pub struct EditSession {
    processor: Arc<dyn ImageProcessor>,
    config: SessionConfig,
    state: EditState,
    history: HistoryManager,

    original: Option<Arc<DynamicImage>>,
    /// Downscaled original every preview render starts from.
    preview_source: Option<Arc<DynamicImage>>,
    preview: Option<DynamicImage>,
    processing: ProcessingState,

    /// Provisional user adjustments while a slider gesture is active.
    provisional_adjustments: Option<Adjustments>,
    temporary_crop_rotate: Option<CropRotateState>,

    renderer: PreviewRenderer,
    generation: u64,

    operations: OperationLog,
    operations_performed: usize,
    started_at: Instant,
    version: u64,
    subscribers: Vec<mpsc::Sender<SessionEvent>>,
}

impl EditSession {
    pub fn new(processor: Arc<dyn ImageProcessor>, config: SessionConfig) -> Self {
        let renderer = PreviewRenderer::spawn(Arc::clone(&processor));
        Self {
            history: HistoryManager::new(config.history.clone()),
            operations: OperationLog::new(config.operation_log_capacity),
            processor,
            config,
            state: EditState::default(),
            original: None,
            preview_source: None,
            preview: None,
            processing: ProcessingState::Idle,
            provisional_adjustments: None,
            temporary_crop_rotate: None,
            renderer,
            generation: 0,
            operations_performed: 0,
            started_at: Instant::now(),
            version: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn with_cpu_processor(config: SessionConfig) -> Self {
        Self::new(Arc::new(CpuProcessor), config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receive a [`SessionEvent`] after every change. Dropped receivers are
    /// pruned on the next send.
    pub fn subscribe(&mut self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn notify(&mut self, change: SessionChange) {
        self.version += 1;
        let event = SessionEvent {
            version: self.version,
            change,
        };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    // ---- Image lifecycle ----

    /// Replace the current image. Edits, staging, history and statistics
    /// start over. A preview that cannot be generated leaves the session
    /// usable (rendering from the full-size original) but `Failed`.
    pub fn load_image(&mut self, image: DynamicImage) {
        self.provisional_adjustments = None;
        self.temporary_crop_rotate = None;
        self.state = EditState::default();
        self.history = HistoryManager::new(self.config.history.clone());
        self.operations = OperationLog::new(self.config.operation_log_capacity);
        self.operations_performed = 0;
        self.started_at = Instant::now();
        self.cancel_render();

        tracing::info!(
            width = image.width(),
            height = image.height(),
            "Loading image into edit session"
        );
        let original = Arc::new(image);
        let preview_result = self
            .processor
            .generate_preview(&original, self.config.preview_max_dimension);
        self.original = Some(Arc::clone(&original));
        self.operations
            .record(EditOperationKind::ImageLoaded, "Image Loaded");

        match preview_result {
            Ok(preview) => {
                let preview = Arc::new(preview);
                self.preview = Some((*preview).clone());
                self.preview_source = Some(preview);
                self.notify(SessionChange::ImageLoaded);
                self.request_preview("Loading");
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(%error, "Preview generation failed");
                self.preview = None;
                self.preview_source = Some(original);
                self.processing = ProcessingState::Failed { error };
                self.notify(SessionChange::ImageLoaded);
            }
        }
    }

    pub fn has_image(&self) -> bool {
        self.original.is_some()
    }

    pub fn original_image(&self) -> Option<&DynamicImage> {
        self.original.as_deref()
    }

    /// Most recent successfully rendered preview.
    pub fn preview_image(&self) -> Option<&DynamicImage> {
        self.preview.as_ref()
    }

    pub fn processing_state(&self) -> &ProcessingState {
        &self.processing
    }

    // ---- Committed edits ----

    /// Apply `command` to committed state and record it. No-op commands are
    /// dropped. Returns true when something changed.
    fn execute(&mut self, command: EditCommand, kind: EditOperationKind) -> bool {
        if command.is_noop() {
            tracing::trace!(description = %command.description(), "Skipping no-op edit");
            return false;
        }
        let description = command.description();
        self.history.add(command, &mut self.state);
        self.after_commit(kind, description);
        true
    }

    fn after_commit(&mut self, kind: EditOperationKind, description: String) {
        self.operations.record(kind, description);
        self.operations_performed += 1;
        self.notify(SessionChange::Edit);
        self.request_preview("Applying Edits");
    }

    /// Apply `filter_type` at `intensity`, replacing any current filter. The
    /// trivial filter removes the current one.
    pub fn apply_filter(&mut self, filter_type: FilterType, intensity: f32) -> bool {
        if filter_type.is_trivial() {
            return self.remove_filter();
        }
        let previous = self.state.applied_filter().cloned();
        let new = AppliedFilter::new(filter_type, intensity);
        if previous.as_ref().is_some_and(|f| {
            f.filter_type() == filter_type
                && (f.intensity() - new.intensity()).abs() < INTENSITY_EPSILON
        }) {
            return false;
        }
        let new_base = new.base_adjustments();
        let command =
            EditCommand::filter(previous, Some(new), *self.state.base_adjustments(), new_base);
        self.execute(command, EditOperationKind::Filter)
    }

    /// Change the intensity of the current filter. Does nothing without one.
    pub fn update_filter_intensity(&mut self, intensity: f32) -> bool {
        let Some(previous) = self.state.applied_filter().cloned() else {
            tracing::trace!("No filter to change intensity of");
            return false;
        };
        let new = previous.with_intensity(intensity);
        if (new.intensity() - previous.intensity()).abs() < INTENSITY_EPSILON {
            return false;
        }
        let new_base = new.base_adjustments();
        let command =
            EditCommand::filter(Some(previous), Some(new), *self.state.base_adjustments(), new_base);
        self.execute(command, EditOperationKind::Filter)
    }

    pub fn remove_filter(&mut self) -> bool {
        let Some(previous) = self.state.applied_filter().cloned() else {
            return false;
        };
        let command = EditCommand::filter(
            Some(previous),
            None,
            *self.state.base_adjustments(),
            Adjustments::default(),
        );
        self.execute(command, EditOperationKind::Filter)
    }

    pub fn update_user_adjustments(&mut self, adjustments: Adjustments) -> bool {
        let command = EditCommand::adjustment(*self.state.user_adjustments(), adjustments);
        self.execute(command, EditOperationKind::Adjustment)
    }

    pub fn set_adjustment(&mut self, field: AdjustmentField, value: f32) -> bool {
        let adjustments = self.state.user_adjustments().with(field, value);
        self.update_user_adjustments(adjustments)
    }

    /// Apply a preset's filter and adjustments as a single undo step.
    pub fn apply_preset(&mut self, preset: &Preset) -> bool {
        let mut scratch = self.state.clone();
        let mut commands = Vec::with_capacity(2);

        let new_filter = preset
            .filter
            .as_ref()
            .filter(|f| !f.filter_type.is_trivial())
            .map(|f| AppliedFilter::new(f.filter_type, f.intensity));
        let same_filter = match (scratch.applied_filter(), new_filter.as_ref()) {
            (None, None) => true,
            (Some(current), Some(new)) => {
                current.filter_type() == new.filter_type()
                    && (current.intensity() - new.intensity()).abs() < INTENSITY_EPSILON
            }
            _ => false,
        };
        if !same_filter {
            let new_base = new_filter
                .as_ref()
                .map(AppliedFilter::base_adjustments)
                .unwrap_or_default();
            let filter_command = EditCommand::filter(
                scratch.applied_filter().cloned(),
                new_filter,
                *scratch.base_adjustments(),
                new_base,
            );
            filter_command.apply(&mut scratch);
            commands.push(filter_command);
        }

        let adjustment_command =
            EditCommand::adjustment(*scratch.user_adjustments(), preset.adjustments);
        if !adjustment_command.is_noop() {
            commands.push(adjustment_command);
        }

        if commands.is_empty() {
            return false;
        }
        let batch = EditCommand::batch(format!("Apply Preset {}", preset.name), commands);
        self.execute(batch, EditOperationKind::Preset)
    }

    /// Look up a configured preset by name and apply it.
    pub fn apply_preset_named(&mut self, name: &str) -> bool {
        let Some(preset) = self.config.preset(name).cloned() else {
            tracing::warn!(name, "Unknown preset");
            return false;
        };
        self.apply_preset(&preset)
    }

    // ---- Adjustment staging ----

    /// Begin a slider gesture. The provisional value starts at the committed
    /// user adjustments.
    pub fn start_previewing_adjustments(&mut self) {
        if self.provisional_adjustments.is_some() {
            return;
        }
        self.provisional_adjustments = Some(*self.state.user_adjustments());
        self.notify(SessionChange::Staging);
    }

    /// Update the provisional value and re-render. Records nothing. Starts a
    /// gesture implicitly if none is active.
    pub fn update_preview_adjustments(&mut self, adjustments: Adjustments) {
        if self.provisional_adjustments == Some(adjustments) {
            return;
        }
        tracing::trace!("Staging adjustments");
        self.provisional_adjustments = Some(adjustments);
        self.notify(SessionChange::Staging);
        self.request_preview("Previewing");
    }

    /// End the gesture, committing the last provisional value as one command.
    pub fn commit_preview_adjustments(&mut self) -> bool {
        let Some(adjustments) = self.provisional_adjustments.take() else {
            return false;
        };
        if self.update_user_adjustments(adjustments) {
            return true;
        }
        // Nothing to record; the preview already matches committed state.
        self.notify(SessionChange::Staging);
        false
    }

    /// End the gesture and drop the provisional value.
    pub fn cancel_preview_adjustments(&mut self) {
        if self.provisional_adjustments.take().is_none() {
            return;
        }
        self.notify(SessionChange::Staging);
        self.request_preview("Restoring");
    }

    pub fn is_previewing_adjustments(&self) -> bool {
        self.provisional_adjustments.is_some()
    }

    // ---- Crop / rotate ----

    pub fn update_crop_rotate_state(&mut self, crop_rotate: CropRotateState) -> bool {
        let command = EditCommand::crop_rotate(self.state.crop_rotate().clone(), crop_rotate);
        self.execute(command, EditOperationKind::CropRotate)
    }

    /// Stage geometry during a drag. Records nothing.
    pub fn update_crop_rotate_state_temporary(&mut self, crop_rotate: CropRotateState) {
        if self.temporary_crop_rotate.as_ref() == Some(&crop_rotate) {
            return;
        }
        tracing::trace!("Staging crop/rotate");
        self.temporary_crop_rotate = Some(crop_rotate);
        self.notify(SessionChange::Staging);
        self.request_preview("Previewing");
    }

    pub fn commit_temporary_crop_rotate_state(&mut self) -> bool {
        let Some(crop_rotate) = self.temporary_crop_rotate.take() else {
            return false;
        };
        if self.update_crop_rotate_state(crop_rotate) {
            return true;
        }
        self.notify(SessionChange::Staging);
        false
    }

    pub fn cancel_temporary_crop_rotate_state(&mut self) {
        if self.temporary_crop_rotate.take().is_none() {
            return;
        }
        self.notify(SessionChange::Staging);
        self.request_preview("Restoring");
    }

    pub fn has_temporary_crop_rotate(&self) -> bool {
        self.temporary_crop_rotate.is_some()
    }

    /// Rotate committed geometry by `delta` radians. Nudges within the
    /// coalescing window merge into the previous rotation entry, and a run
    /// that returns to its starting angle leaves no entry at all.
    pub fn nudge_rotation(&mut self, delta: f32) -> bool {
        let previous = self.state.crop_rotate().clone();
        let new = previous.clone().rotated_by(delta);
        let command = EditCommand::crop_rotate(previous, new);
        if command.is_noop() {
            return false;
        }
        let description = command.description();
        let window = self.config.coalesce_window();
        let merged = self.history.add_or_merge(command, &mut self.state, window);
        tracing::trace!(merged, "Rotation nudge");
        self.after_commit(EditOperationKind::CropRotate, description);
        true
    }

    // ---- Resets ----

    /// Reset as one undo step. A complete reset also restores identity
    /// geometry.
    pub fn reset(&mut self, kind: ResetKind) -> bool {
        self.provisional_adjustments = None;
        self.temporary_crop_rotate = None;

        let reset = EditCommand::reset(kind, &self.state);
        let command = if kind == ResetKind::Complete && !self.state.crop_rotate().is_identity() {
            let geometry = EditCommand::crop_rotate(
                self.state.crop_rotate().clone(),
                CropRotateState::identity(),
            );
            EditCommand::batch(kind.description(), vec![reset, geometry])
        } else {
            reset
        };
        if !self.execute(command, EditOperationKind::Reset) {
            // Staging was dropped even though nothing was committed.
            self.request_preview("Restoring");
            return false;
        }
        true
    }

    /// Reset scaled to how much has been edited; see [`crate::reset::SmartResetPolicy`].
    pub fn smart_reset(&mut self) -> bool {
        let level = self.config.smart_reset.choose(&self.state);
        tracing::debug!(level = level.label(), "Smart reset");
        self.reset(ResetKind::Smart(level))
    }

    // ---- History ----

    /// Discard staged values. Returns true when anything was staged.
    fn drop_staging(&mut self) -> bool {
        let adjustments = self.provisional_adjustments.take();
        let crop_rotate = self.temporary_crop_rotate.take();
        let dropped = adjustments.is_some() || crop_rotate.is_some();
        if dropped {
            tracing::trace!("Dropping staged values");
        }
        dropped
    }

    /// Re-render committed state after staging was dropped without a
    /// history step taking its place.
    fn restore_after_dropped_staging(&mut self, dropped: bool) {
        if dropped {
            self.notify(SessionChange::Staging);
            self.request_preview("Restoring");
        }
    }

    pub fn undo(&mut self) -> bool {
        let dropped = self.drop_staging();
        let description = self.history.undo_description();
        if !self.history.undo(&mut self.state) {
            self.restore_after_dropped_staging(dropped);
            return false;
        }
        let description = format!("Undo {}", description.unwrap_or_default());
        self.after_history_step(EditOperationKind::Undo, description);
        true
    }

    pub fn redo(&mut self) -> bool {
        let dropped = self.drop_staging();
        let description = self.history.redo_description();
        if !self.history.redo(&mut self.state) {
            self.restore_after_dropped_staging(dropped);
            return false;
        }
        let description = format!("Redo {}", description.unwrap_or_default());
        self.after_history_step(EditOperationKind::Redo, description);
        true
    }

    /// Undo or redo one step at a time until `position` commands are applied.
    /// Returns the number of steps taken.
    pub fn jump_to_history_position(&mut self, position: usize) -> usize {
        let dropped = self.drop_staging();
        let from = self.history.position();
        let steps = self.history.jump_to(position, &mut self.state);
        if steps > 0 {
            let kind = if position < from {
                EditOperationKind::Undo
            } else {
                EditOperationKind::Redo
            };
            self.after_history_step(kind, format!("Jump to Step {position}"));
        } else {
            self.restore_after_dropped_staging(dropped);
        }
        steps
    }

    fn after_history_step(&mut self, kind: EditOperationKind, description: String) {
        self.operations.record(kind, description);
        self.operations_performed += 1;
        self.notify(SessionChange::Edit);
        self.request_preview("Applying Edits");
    }

    /// Forget all history. Committed state is untouched.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.operations
            .record(EditOperationKind::HistoryCleared, "History Cleared");
        self.notify(SessionChange::History);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.history.redo_description()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_statistics(&self) -> HistoryStatistics {
        self.history.statistics()
    }

    // ---- Queries ----

    /// Committed edit state.
    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// Base adjustments plus the provisional user values while previewing,
    /// otherwise plus the committed ones.
    pub fn effective_adjustments(&self) -> Adjustments {
        match &self.provisional_adjustments {
            Some(provisional) => self.state.base_adjustments().combined(provisional),
            None => self.state.effective_adjustments(),
        }
    }

    /// Temporary geometry while dragging, otherwise the committed geometry.
    pub fn effective_crop_rotate(&self) -> &CropRotateState {
        self.temporary_crop_rotate
            .as_ref()
            .unwrap_or_else(|| self.state.crop_rotate())
    }

    pub fn has_edits(&self) -> bool {
        self.state.has_edits()
    }

    /// Recent operations, oldest first.
    pub fn recent_operations(&self) -> impl Iterator<Item = &EditOperation> {
        self.operations.iter()
    }

    pub fn session_statistics(&self) -> SessionStatistics {
        let history = self.history.statistics();
        SessionStatistics {
            duration_secs: self.started_at.elapsed().as_secs_f64(),
            operations_performed: self.operations_performed,
            total_commands: self.history.command_count(),
            history_position: self.history.position(),
            memory_usage_bytes: self.history.memory_usage(),
            undo_operations: history.undo_operations,
            redo_operations: history.redo_operations,
            history_truncated: self.history.is_truncated(),
            has_edits: self.has_edits(),
        }
    }

    // ---- Preview pipeline ----

    fn cancel_render(&mut self) {
        self.generation += 1;
        self.renderer.invalidate(self.generation);
    }

    /// Render the effective state in the background, superseding any render
    /// in flight.
    fn request_preview(&mut self, label: &str) {
        let Some(source) = self.preview_source.clone() else {
            return;
        };
        self.generation += 1;
        let job = RenderJob {
            generation: self.generation,
            source,
            adjustments: self.effective_adjustments(),
            filter: self.state.applied_filter().cloned(),
            crop_rotate: self.effective_crop_rotate().clone(),
        };
        if self.renderer.submit(job) {
            self.processing = ProcessingState::Processing {
                progress: 0.0,
                label: label.to_string(),
            };
        } else {
            tracing::warn!("Preview worker unavailable");
            self.processing = ProcessingState::Failed {
                error: "preview worker unavailable".to_string(),
            };
        }
        self.notify(SessionChange::Processing);
    }

    fn handle_outcome(&mut self, outcome: RenderOutcome) -> bool {
        if outcome.generation != self.generation {
            tracing::trace!(
                generation = outcome.generation,
                current = self.generation,
                "Dropping stale preview"
            );
            return false;
        }
        match outcome.result {
            Ok(image) => {
                self.preview = Some(image);
                self.processing = ProcessingState::Completed;
                self.notify(SessionChange::PreviewReady);
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(%error, "Preview render failed");
                self.processing = ProcessingState::Failed { error };
                self.notify(SessionChange::Processing);
            }
        }
        true
    }

    /// Drain finished renders without blocking. Returns true when the
    /// current render landed.
    pub fn poll(&mut self) -> bool {
        let mut landed = false;
        while let Some(outcome) = self.renderer.try_recv() {
            landed |= self.handle_outcome(outcome);
        }
        landed
    }

    /// Block until the current render lands. Returns immediately when
    /// nothing is rendering.
    pub fn wait_for_preview(&mut self) {
        while self.processing.is_processing() {
            let Some(outcome) = self.renderer.recv() else {
                self.processing = ProcessingState::Failed {
                    error: "preview worker unavailable".to_string(),
                };
                self.notify(SessionChange::Processing);
                return;
            };
            self.handle_outcome(outcome);
        }
    }

    // ---- Finalize / export ----

    /// Render the committed state at full resolution. Staged values are not
    /// included.
    pub fn get_final_image(&mut self) -> Result<DynamicImage, SessionError> {
        let Some(original) = self.original.clone() else {
            return Err(SessionError::NoImage);
        };
        let result = self.processor.process_image(
            &original,
            &self.state.effective_adjustments(),
            self.state.applied_filter(),
            Some(self.state.crop_rotate()),
        );
        result.map_err(|err| self.fail("render", &err))
    }

    pub fn export_image(
        &mut self,
        format: ExportFormat,
        quality: f32,
    ) -> Result<Vec<u8>, SessionError> {
        let image = self.get_final_image()?;
        let bytes = self
            .processor
            .export_image(&image, format, quality)
            .map_err(|err| self.fail("export", &err))?;
        tracing::info!(
            format = format.label(),
            bytes = bytes.len(),
            "Exported image"
        );
        self.operations
            .record(EditOperationKind::Export, format!("Export {}", format.label()));
        self.operations_performed += 1;
        Ok(bytes)
    }

    fn fail(&mut self, stage: &'static str, err: &anyhow::Error) -> SessionError {
        let error = SessionError::processing(stage, err);
        tracing::warn!(%error, "Finalize failed");
        self.processing = ProcessingState::Failed {
            error: error.to_string(),
        };
        self.notify(SessionChange::Processing);
        error
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, mpsc};

    use image::{DynamicImage, ImageBuffer, Rgba};

    use super::{EditSession, ProcessingState, SessionChange};
    use crate::adjustments::{AdjustmentField, Adjustments};
    use crate::config::{Preset, PresetFilter, SessionConfig};
    use crate::crop::{CropRotateState, NormalizedRect};
    use crate::error::SessionError;
    use crate::filter::{AppliedFilter, FilterType};
    use crate::history::HistoryConfig;
    use crate::processing::{ExportFormat, ImageProcessor};
    use crate::reset::ResetKind;

    /// Renders a 1x1 image whose red channel encodes effective brightness.
    #[derive(Default)]
    struct StubProcessor {
        fail: AtomicBool,
    }

    fn encode_brightness(adjustments: &Adjustments) -> u8 {
        ((adjustments.get(AdjustmentField::Brightness) + 1.0) * 100.0).round() as u8
    }

    impl ImageProcessor for StubProcessor {
        fn generate_preview(
            &self,
            image: &DynamicImage,
            _max_dimension: u32,
        ) -> anyhow::Result<DynamicImage> {
            Ok(image.clone())
        }

        fn process_image(
            &self,
            _image: &DynamicImage,
            adjustments: &Adjustments,
            _filter: Option<&AppliedFilter>,
            _crop_rotate: Option<&CropRotateState>,
        ) -> anyhow::Result<DynamicImage> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("stub render failure");
            }
            let red = encode_brightness(adjustments);
            Ok(DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
                1,
                1,
                Rgba([red, 0, 0, 255]),
            )))
        }

        fn export_image(
            &self,
            _image: &DynamicImage,
            _format: ExportFormat,
            _quality: f32,
        ) -> anyhow::Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    /// Reports each render's brightness, then blocks until released.
    struct GatedProcessor {
        started: Mutex<mpsc::Sender<f32>>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl ImageProcessor for GatedProcessor {
        fn generate_preview(&self, image: &DynamicImage, _: u32) -> anyhow::Result<DynamicImage> {
            Ok(image.clone())
        }

        fn process_image(
            &self,
            _image: &DynamicImage,
            adjustments: &Adjustments,
            _filter: Option<&AppliedFilter>,
            _crop_rotate: Option<&CropRotateState>,
        ) -> anyhow::Result<DynamicImage> {
            let brightness = adjustments.get(AdjustmentField::Brightness);
            if let Ok(started) = self.started.lock() {
                let _ = started.send(brightness);
            }
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            let red = encode_brightness(adjustments);
            Ok(DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
                1,
                1,
                Rgba([red, 0, 0, 255]),
            )))
        }

        fn export_image(&self, _: &DynamicImage, _: ExportFormat, _: f32) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 4, Rgba([120, 120, 120, 255])))
    }

    fn session_with(processor: Arc<StubProcessor>) -> EditSession {
        let mut session = EditSession::new(processor, SessionConfig::default());
        session.load_image(sample_image());
        session.wait_for_preview();
        session
    }

    fn session() -> EditSession {
        session_with(Arc::new(StubProcessor::default()))
    }

    fn user(session: &EditSession, field: AdjustmentField) -> f32 {
        session.state().user_adjustments().get(field)
    }

    fn preview_red(session: &EditSession) -> u8 {
        session.preview_image().unwrap().to_rgba8().get_pixel(0, 0)[0]
    }

    #[test]
    fn brightness_edit_undo_redo() {
        let mut session = session();
        assert!(!session.has_edits());

        session.set_adjustment(AdjustmentField::Brightness, 0.5);
        assert!(session.has_edits());
        assert!(session.can_undo());
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.5);

        assert!(session.undo());
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.0);
        assert!(!session.can_undo());
        assert!(session.can_redo());

        assert!(session.redo());
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.5);
    }

    #[test]
    fn filter_change_undoes_to_previous_filter() {
        let mut session = session();
        session.apply_filter(FilterType::Vintage, 0.8);
        session.apply_filter(FilterType::Sepia, 0.6);
        assert_eq!(session.undo_description().as_deref(), Some("Change Filter to Sepia"));

        assert!(session.undo());
        let filter = session.state().applied_filter().unwrap();
        assert_eq!(filter.filter_type(), FilterType::Vintage);
        assert_eq!(filter.intensity(), 0.8);
        assert_eq!(
            *session.state().base_adjustments(),
            FilterType::Vintage.base_adjustments(0.8)
        );
    }

    #[test]
    fn filter_intensity_and_removal_are_recorded() {
        let mut session = session();
        assert!(!session.update_filter_intensity(0.5));
        session.apply_filter(FilterType::Mono, 1.0);
        assert!(session.update_filter_intensity(0.25));
        assert_eq!(session.state().applied_filter().unwrap().intensity(), 0.25);
        assert!(session.remove_filter());
        assert!(session.state().applied_filter().is_none());
        assert!(session.state().base_adjustments().is_neutral());
        assert_eq!(session.history().command_count(), 3);

        session.undo();
        assert_eq!(session.state().applied_filter().unwrap().intensity(), 0.25);
    }

    #[test]
    fn slider_gesture_commits_one_command() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Contrast, 0.1);
        let before = session.history().command_count();

        session.start_previewing_adjustments();
        let base = *session.state().user_adjustments();
        session.update_preview_adjustments(base.with(AdjustmentField::Contrast, 0.2));
        session.update_preview_adjustments(base.with(AdjustmentField::Contrast, 0.4));
        assert!(session.commit_preview_adjustments());

        assert_eq!(session.history().command_count(), before + 1);
        assert_eq!(user(&session, AdjustmentField::Contrast), 0.4);
        session.undo();
        assert_eq!(user(&session, AdjustmentField::Contrast), 0.1);
    }

    #[test]
    fn staging_never_touches_history_or_committed_state() {
        let mut session = session();
        session.start_previewing_adjustments();
        for i in 0..10 {
            let v = i as f32 / 10.0;
            session.update_preview_adjustments(
                Adjustments::default().with(AdjustmentField::Brightness, v),
            );
            session.update_crop_rotate_state_temporary(CropRotateState::identity().with_rotation(v));
        }
        assert!(session.is_previewing_adjustments());
        assert!(!session.can_undo());
        assert_eq!(session.history().command_count(), 0);
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.0);
        assert!(session.state().crop_rotate().is_identity());
        assert_eq!(
            session.effective_adjustments().get(AdjustmentField::Brightness),
            0.9
        );
        assert_eq!(session.effective_crop_rotate().rotation(), 0.9);
    }

    #[test]
    fn cancel_restores_committed_values() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Shadows, 0.3);
        let committed = session.effective_adjustments();

        session.start_previewing_adjustments();
        session.update_preview_adjustments(Adjustments::default());
        session.cancel_preview_adjustments();
        assert_eq!(session.effective_adjustments(), committed);

        session.update_crop_rotate_state_temporary(
            CropRotateState::identity().with_flip_vertical(true),
        );
        session.cancel_temporary_crop_rotate_state();
        assert!(session.effective_crop_rotate().is_identity());
        assert_eq!(session.history().command_count(), 1);
    }

    #[test]
    fn crop_drag_commits_one_command() {
        let mut session = session();
        for i in 1..=5 {
            let extent = 1.0 - i as f32 * 0.1;
            session.update_crop_rotate_state_temporary(
                CropRotateState::identity().with_crop(NormalizedRect::new(0.0, 0.0, extent, extent)),
            );
        }
        assert!(session.commit_temporary_crop_rotate_state());
        assert!(!session.has_temporary_crop_rotate());
        assert_eq!(session.history().command_count(), 1);
        assert_eq!(session.state().crop_rotate().crop().width, 0.5);
        assert_eq!(session.undo_description().as_deref(), Some("Crop"));
    }

    #[test]
    fn preview_reflects_latest_edit() {
        let mut session = session();
        assert_eq!(*session.processing_state(), ProcessingState::Completed);
        assert_eq!(preview_red(&session), 100);

        session.set_adjustment(AdjustmentField::Brightness, 0.5);
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 150);

        session.start_previewing_adjustments();
        session.update_preview_adjustments(
            Adjustments::default().with(AdjustmentField::Brightness, -0.5),
        );
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 50);

        session.cancel_preview_adjustments();
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 150);
    }

    #[test]
    fn render_failure_keeps_committed_state() {
        let processor = Arc::new(StubProcessor::default());
        let mut session = session_with(Arc::clone(&processor));

        processor.fail.store(true, Ordering::SeqCst);
        session.set_adjustment(AdjustmentField::Brightness, 0.4);
        session.wait_for_preview();
        assert!(matches!(
            session.processing_state(),
            ProcessingState::Failed { error } if error.contains("stub render failure")
        ));
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.4);
        assert_eq!(preview_red(&session), 100);

        processor.fail.store(false, Ordering::SeqCst);
        session.set_adjustment(AdjustmentField::Contrast, 0.1);
        session.wait_for_preview();
        assert_eq!(*session.processing_state(), ProcessingState::Completed);
        assert_eq!(preview_red(&session), 140);
    }

    #[test]
    fn superseded_render_is_discarded() {
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let processor = Arc::new(GatedProcessor {
            started: Mutex::new(started_tx),
            gate: Mutex::new(gate_rx),
        });
        let mut session = EditSession::new(processor, SessionConfig::default());
        session.load_image(sample_image());
        // The load render is now blocked inside the processor.
        assert_eq!(started_rx.recv().unwrap(), 0.0);

        session.set_adjustment(AdjustmentField::Brightness, 0.5);
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        session.wait_for_preview();

        assert_eq!(*session.processing_state(), ProcessingState::Completed);
        assert_eq!(preview_red(&session), 150);
        assert_eq!(started_rx.recv().unwrap(), 0.5);
        assert!(!session.poll());
    }

    #[test]
    fn rotation_nudges_coalesce() {
        let mut session = session();
        session.nudge_rotation(0.1);
        session.nudge_rotation(0.1);
        session.nudge_rotation(0.1);
        assert_eq!(session.history().command_count(), 1);
        assert!((session.state().crop_rotate().rotation() - 0.3).abs() < 1e-5);

        session.undo();
        assert!(session.state().crop_rotate().is_identity());
        session.redo();

        session.update_crop_rotate_state(CropRotateState::identity().with_rotation(FRAC_PI_2));
        assert_eq!(session.history().command_count(), 2);
    }

    #[test]
    fn complete_reset_restores_geometry_in_one_step() {
        let mut session = session();
        session.apply_filter(FilterType::Noir, 0.9);
        session.set_adjustment(AdjustmentField::Exposure, 1.0);
        session.update_crop_rotate_state(CropRotateState::identity().with_flip_horizontal(true));

        assert!(session.reset(ResetKind::Complete));
        assert!(!session.has_edits());
        assert_eq!(session.undo_description().as_deref(), Some("Reset All"));

        session.undo();
        assert!(session.state().crop_rotate().flip_horizontal());
        assert_eq!(user(&session, AdjustmentField::Exposure), 1.0);
        assert_eq!(
            session.state().applied_filter().unwrap().filter_type(),
            FilterType::Noir
        );
    }

    #[test]
    fn smart_reset_scales_with_edit_size() {
        let mut session = session();
        session.apply_filter(FilterType::Vintage, 0.8);
        assert!(session.smart_reset());
        // Filter only: moderate reset caps intensity.
        assert_eq!(session.state().applied_filter().unwrap().intensity(), 0.5);
        assert_eq!(
            session.undo_description().as_deref(),
            Some("Smart Reset (Moderate)")
        );

        session.update_filter_intensity(0.9);
        session.set_adjustment(AdjustmentField::Saturation, 0.6);
        assert!(session.smart_reset());
        assert!(!session.has_edits());

        session.set_adjustment(AdjustmentField::Tint, 0.1);
        assert!(session.smart_reset());
        assert_eq!(
            session.undo_description().as_deref(),
            Some("Smart Reset (Minimal)")
        );
        assert!(!session.has_edits());
    }

    #[test]
    fn reset_with_nothing_to_reset_records_nothing() {
        let mut session = session();
        assert!(!session.reset(ResetKind::AdjustmentsOnly));
        assert!(!session.can_undo());
    }

    #[test]
    fn preset_undoes_in_one_step() {
        let mut session = session();
        let preset = Preset {
            name: "Punchy".to_string(),
            filter: Some(PresetFilter {
                filter_type: FilterType::Vivid,
                intensity: 0.7,
            }),
            adjustments: Adjustments::default().with(AdjustmentField::Contrast, 0.2),
        };
        assert!(session.apply_preset(&preset));
        assert_eq!(session.history().command_count(), 1);
        assert_eq!(session.undo_description().as_deref(), Some("Apply Preset Punchy"));
        assert_eq!(
            session.state().applied_filter().unwrap().filter_type(),
            FilterType::Vivid
        );
        assert_eq!(user(&session, AdjustmentField::Contrast), 0.2);

        // Re-applying changes nothing.
        assert!(!session.apply_preset(&preset));

        session.undo();
        assert!(!session.has_edits());
    }

    #[test]
    fn no_op_edits_are_not_recorded() {
        let mut session = session();
        assert!(!session.set_adjustment(AdjustmentField::Warmth, 0.0));
        assert!(!session.remove_filter());
        assert!(!session.update_crop_rotate_state(CropRotateState::identity()));
        session.apply_filter(FilterType::Cool, 0.5);
        assert!(!session.apply_filter(FilterType::Cool, 0.5));

        session.start_previewing_adjustments();
        assert!(!session.commit_preview_adjustments());
        assert_eq!(session.history().command_count(), 1);
    }

    #[test]
    fn jump_moves_through_history() {
        let mut session = session();
        for v in [0.1, 0.2, 0.3, 0.4] {
            session.set_adjustment(AdjustmentField::Brightness, v);
        }
        assert_eq!(session.jump_to_history_position(1), 3);
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.1);
        assert_eq!(session.jump_to_history_position(3), 2);
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.3);
        assert_eq!(session.jump_to_history_position(10), 1);
        assert_eq!(session.jump_to_history_position(4), 0);
    }

    #[test]
    fn undo_drops_active_staging() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Highlights, -0.2);
        session.start_previewing_adjustments();
        session.update_preview_adjustments(Adjustments::default());
        session.undo();
        assert!(!session.is_previewing_adjustments());
        assert!(session.effective_adjustments().is_neutral());
    }

    #[test]
    fn failed_undo_redo_and_jump_restore_committed_preview() {
        let mut session = session();
        let dragged = Adjustments::default().with(AdjustmentField::Brightness, -0.8);

        session.start_previewing_adjustments();
        session.update_preview_adjustments(dragged);
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 20);
        assert!(!session.undo());
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 100);
        assert_eq!(*session.processing_state(), ProcessingState::Completed);
        assert!(!session.is_previewing_adjustments());
        assert_eq!(session.effective_adjustments().get(AdjustmentField::Brightness), 0.0);

        session.start_previewing_adjustments();
        session.update_preview_adjustments(dragged);
        session.wait_for_preview();
        assert!(!session.redo());
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 100);

        session.update_crop_rotate_state_temporary(CropRotateState::identity().with_rotation(0.5));
        session.start_previewing_adjustments();
        session.update_preview_adjustments(dragged);
        session.wait_for_preview();
        assert_eq!(session.jump_to_history_position(0), 0);
        session.wait_for_preview();
        assert_eq!(preview_red(&session), 100);
        assert!(!session.has_temporary_crop_rotate());
        assert!(session.effective_crop_rotate().is_identity());
        assert_eq!(session.history().command_count(), 0);
    }

    #[test]
    fn reapplying_filter_compares_clamped_intensity() {
        let mut session = session();
        assert!(session.apply_filter(FilterType::Vintage, 1.5));
        assert_eq!(session.state().applied_filter().unwrap().intensity(), 1.0);
        assert!(!session.apply_filter(FilterType::Vintage, 1.5));
        assert!(!session.apply_filter(FilterType::Vintage, 1.0));

        assert!(session.apply_filter(FilterType::Sepia, -0.3));
        assert!(!session.apply_filter(FilterType::Sepia, f32::NAN));
        assert!(!session.apply_filter(FilterType::Sepia, 0.0));

        assert_eq!(session.history().command_count(), 2);
        assert_eq!(session.session_statistics().operations_performed, 2);
    }

    #[test]
    fn adjustments_only_reset_keeps_filter_until_intensity_changes() {
        let mut session = session();
        session.apply_filter(FilterType::Vintage, 0.8);
        session.set_adjustment(AdjustmentField::Brightness, 0.3);

        assert!(session.reset(ResetKind::AdjustmentsOnly));
        let filter = session.state().applied_filter().unwrap();
        assert_eq!(filter.filter_type(), FilterType::Vintage);
        assert_eq!(filter.intensity(), 0.8);
        assert!(session.state().base_adjustments().is_neutral());
        assert!(session.state().user_adjustments().is_neutral());

        assert!(session.update_filter_intensity(0.5));
        assert_eq!(
            *session.state().base_adjustments(),
            FilterType::Vintage.base_adjustments(0.5)
        );

        session.undo();
        assert!(session.state().base_adjustments().is_neutral());
        session.undo();
        assert_eq!(
            *session.state().base_adjustments(),
            FilterType::Vintage.base_adjustments(0.8)
        );
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.3);
    }

    #[test]
    fn load_image_starts_over() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Brightness, 0.2);
        session.update_crop_rotate_state_temporary(CropRotateState::identity().with_rotation(1.0));

        session.load_image(sample_image());
        assert!(session.has_image());
        assert_eq!(session.original_image().map(|image| image.width()), Some(4));
        assert!(!session.has_edits());
        assert!(!session.can_undo());
        assert!(!session.has_temporary_crop_rotate());
        assert_eq!(session.session_statistics().operations_performed, 0);
        assert_eq!(session.recent_operations().count(), 1);
    }

    #[test]
    fn disabled_history_still_applies_edits() {
        let config = SessionConfig {
            history: HistoryConfig {
                enabled: false,
                ..HistoryConfig::default()
            },
            ..SessionConfig::default()
        };
        let mut session = EditSession::new(Arc::new(StubProcessor::default()), config);
        session.load_image(sample_image());
        session.set_adjustment(AdjustmentField::Brightness, 0.3);
        assert_eq!(user(&session, AdjustmentField::Brightness), 0.3);
        assert!(!session.can_undo());
        assert!(!session.undo());
    }

    #[test]
    fn subscribers_see_increasing_versions() {
        let mut session = EditSession::new(Arc::new(StubProcessor::default()), SessionConfig::default());
        let events = session.subscribe();
        session.load_image(sample_image());
        session.set_adjustment(AdjustmentField::Brightness, 0.1);
        session.wait_for_preview();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received.first().map(|e| e.change), Some(SessionChange::ImageLoaded));
        assert!(received.iter().any(|e| e.change == SessionChange::Edit));
        assert_eq!(received.last().map(|e| e.change), Some(SessionChange::PreviewReady));
        assert!(received.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(received.last().map(|e| e.version), Some(session.version()));
    }

    #[test]
    fn statistics_track_activity() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Brightness, 0.1);
        session.set_adjustment(AdjustmentField::Brightness, 0.2);
        session.undo();
        let stats = session.session_statistics();
        assert_eq!(stats.operations_performed, 3);
        assert_eq!(stats.total_commands, 1);
        assert_eq!(stats.history_position, 1);
        assert_eq!(stats.undo_operations, 1);
        assert!(stats.memory_usage_bytes > 0);
        assert!(!stats.history_truncated);
        assert_eq!(
            session.recent_operations().last().map(|op| op.description.as_str()),
            Some("Undo Adjust Brightness")
        );
    }

    #[test]
    fn clear_history_keeps_state() {
        let mut session = session();
        session.set_adjustment(AdjustmentField::Saturation, -0.5);
        session.clear_history();
        assert!(!session.can_undo());
        assert_eq!(user(&session, AdjustmentField::Saturation), -0.5);
    }

    #[test]
    fn finalize_requires_image() {
        let mut session =
            EditSession::new(Arc::new(StubProcessor::default()), SessionConfig::default());
        assert!(!session.has_image());
        assert!(session.original_image().is_none());
        assert!(matches!(session.get_final_image(), Err(SessionError::NoImage)));
        assert!(matches!(
            session.export_image(ExportFormat::Png, 1.0),
            Err(SessionError::NoImage)
        ));
    }

    #[test]
    fn final_render_failure_is_reported() {
        let processor = Arc::new(StubProcessor::default());
        let mut session = session_with(Arc::clone(&processor));
        processor.fail.store(true, Ordering::SeqCst);
        let err = session.export_image(ExportFormat::Jpeg, 0.9).unwrap_err();
        assert!(matches!(err, SessionError::Processing { stage: "render", .. }));
        assert!(matches!(session.processing_state(), ProcessingState::Failed { .. }));
    }

    #[test]
    fn cpu_export_renders_committed_geometry() {
        let mut session = EditSession::with_cpu_processor(SessionConfig::default());
        session.load_image(DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            8,
            4,
            Rgba([90, 90, 90, 255]),
        )));
        session.update_crop_rotate_state(CropRotateState::identity().with_rotation(FRAC_PI_2));
        // Staged geometry is not part of the final render.
        session.update_crop_rotate_state_temporary(
            CropRotateState::identity().with_crop(NormalizedRect::new(0.0, 0.0, 0.5, 0.5)),
        );

        let final_image = session.get_final_image().unwrap();
        assert_eq!((final_image.width(), final_image.height()), (4, 8));

        let bytes = session.export_image(ExportFormat::Png, 1.0).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        assert_eq!(
            session.recent_operations().last().map(|op| op.description.as_str()),
            Some("Export PNG")
        );
    }
}
