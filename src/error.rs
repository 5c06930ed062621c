use thiserror::Error;

/// Errors surfaced by the blocking finalize/export calls. Interactive edits
/// never fail; render failures there only show up in the processing state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image loaded")]
    NoImage,
    #[error("{stage} failed: {message}")]
    Processing {
        stage: &'static str,
        message: String,
    },
}

impl SessionError {
    pub(crate) fn processing(stage: &'static str, err: &anyhow::Error) -> Self {
        SessionError::Processing {
            stage,
            message: format!("{err:#}"),
        }
    }
}
