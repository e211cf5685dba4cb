use thiserror::Error;

/// Error taxonomy for the pipeline.
///
/// "Indicator undefined" is deliberately not here: a zero or missing
/// denominator is a valid state of an indicator value, not a failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient transport failure; callers retry with backoff.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The source has no published archive for this year.
    #[error("no DFP archive published for year {year}")]
    NotFound { year: u16 },

    /// Structurally invalid archive: corrupt zip, missing statement
    /// members, or a statement CSV without the required columns.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// The external quote source is not reachable.
    #[error("quote source unavailable: {0}")]
    SourceUnavailable(String),

    /// Local store failure. Systemic: aborts the whole batch.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::MalformedArchive(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::MalformedArchive(err.to_string())
    }
}
