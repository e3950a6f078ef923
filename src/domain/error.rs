//! Domain error types.
//!
//! Missing indicators and undetermined classifications are ordinary data
//! and never appear here. Only configuration defects and adapter failures
//! abort a computation.

use crate::domain::phase::Phase;

/// Top-level error type for macrocycle.
#[derive(Debug, thiserror::Error)]
pub enum MacrocycleError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no base allocation for phase {phase}")]
    MissingBaseAllocation { phase: Phase },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MacrocycleError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        MacrocycleError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&MacrocycleError> for std::process::ExitCode {
    fn from(err: &MacrocycleError) -> Self {
        let code: u8 = match err {
            MacrocycleError::Io(_) => 1,
            MacrocycleError::ConfigParse { .. }
            | MacrocycleError::ConfigMissing { .. }
            | MacrocycleError::ConfigInvalid { .. } => 2,
            MacrocycleError::Data { .. } => 3,
            MacrocycleError::MissingBaseAllocation { .. } => 4,
            MacrocycleError::Report { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_base_allocation_names_the_phase() {
        let err = MacrocycleError::MissingBaseAllocation {
            phase: Phase::Contraction,
        };
        assert_eq!(err.to_string(), "no base allocation for phase CONTRACTION");
    }

    #[test]
    fn config_invalid_message_includes_section_and_key() {
        let err = MacrocycleError::invalid("timing", "cycle_weight", "must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid config value [timing] cycle_weight: must be non-negative"
        );
    }

    #[test]
    fn io_error_converts_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MacrocycleError = io.into();
        assert!(matches!(err, MacrocycleError::Io(_)));
        assert_eq!(err.to_string(), "gone");
    }
}
