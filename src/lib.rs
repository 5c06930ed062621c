//! Non-destructive photo editing core: reversible edit commands, a bounded
//! undo/redo history, gesture staging and a cancellable background preview.

pub mod adjustments;
pub mod command;
pub mod config;
pub mod crop;
pub mod error;
pub mod filter;
pub mod history;
pub mod operations;
pub mod processing;
pub mod render;
pub mod reset;
pub mod session;
pub mod state;

pub use adjustments::{AdjustmentField, Adjustments};
pub use command::{CommandCategory, CommandKind, EditCommand};
pub use config::{Preset, SessionConfig};
pub use crop::{AspectRatio, CropRotateState, NormalizedRect};
pub use error::SessionError;
pub use filter::{AppliedFilter, FilterType};
pub use history::{HistoryConfig, HistoryManager, HistoryStatistics};
pub use operations::{EditOperation, EditOperationKind};
pub use processing::{CpuProcessor, ExportFormat, ImageProcessor};
pub use reset::{ResetKind, SmartResetLevel, SmartResetPolicy};
pub use session::{EditSession, ProcessingState, SessionChange, SessionEvent, SessionStatistics};
pub use state::EditState;
