use thiserror::Error;

/// Main error type of the crate.
/// Aggregates the errors of every module so the pipeline can tag and report them uniformly.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("{context}: {source}")]
    WithContextError { context: String, source: Box<SheetError> },

    #[error("{0}")]
    AnyhowError(#[from] anyhow::Error),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Module errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    SourceError(#[from] crate::source::SourceError),

    #[error("{0}")]
    StructureDetectionError(#[from] crate::structure::StructureDetectionError),

    #[error("{0}")]
    CleaningError(#[from] crate::cleaner::CleaningError),

    #[error("{0}")]
    ParsingError(#[from] crate::parser::ParsingError),
}

impl SheetError {
    /// Short tag reported next to the message in result objects.
    pub fn kind(&self) -> &'static str {
        match self {
            SheetError::WithContextError { source, .. } => source.kind(),
            SheetError::AnyhowError(_) => "internal",
            SheetError::IoError(_) => "io",
            SheetError::ConfigError(_) => "configuration",
            SheetError::SourceError(error) => error.kind(),
            SheetError::StructureDetectionError(_) => "structure_detection",
            SheetError::CleaningError(_) => "cleaning",
            SheetError::ParsingError(_) => "parsing",
        }
    }
}

pub trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetError::WithContextError {
            context: message.to_owned(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::*;
    use crate::parser::ParsingError;

    #[test]
    fn prefix_keeps_kind() {
        let result: Result<(), SheetError> = Err(ParsingError::RegionOutOfGrid {
            reference: "A1:B9".to_owned(),
            rows: 3,
            cols: 2,
        }
        .into());
        let error = result.with_prefix("Sheet 'Notes'").with_prefix("report.csv").expect_err("still an error");

        assert_eq!(error.kind(), "parsing");
        assert_eq!(
            error.to_string(),
            "report.csv: Sheet 'Notes': Region A1:B9 lies outside the 3x2 grid"
        );
    }

    #[test]
    fn anyhow_context() {
        use anyhow::Context;
        let result: anyhow::Result<u64> = "x".parse::<u64>().context("Parsing worker count");
        let error = SheetError::from(result.expect_err("not a number"));
        assert_eq!(error.kind(), "internal");
        assert_eq!(error.to_string(), "Parsing worker count");
    }
}
