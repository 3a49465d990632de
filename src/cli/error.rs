//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(InfraError::Application(e)) => match e {
                ApplicationError::Domain(d) if d.is_configuration() => exitcode::CONFIG,
                ApplicationError::Domain(_) => exitcode::DATAERR,
                ApplicationError::Config { .. } => exitcode::CONFIG,
                ApplicationError::InputNotFound(_) => exitcode::NOINPUT,
                ApplicationError::CannotCreate { .. } => exitcode::CANTCREAT,
                ApplicationError::OperationFailed { .. } => exitcode::IOERR,
                ApplicationError::Render { .. } => exitcode::SOFTWARE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigurationError, DataError, DomainError};
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case(
        ApplicationError::Domain(DomainError::Configuration(ConfigurationError::EmptySelection)),
        exitcode::CONFIG
    )]
    #[case(
        ApplicationError::Domain(DomainError::Data(DataError::EmptyTable)),
        exitcode::DATAERR
    )]
    #[case(ApplicationError::InputNotFound(PathBuf::from("x.csv")), exitcode::NOINPUT)]
    #[case(
        ApplicationError::Config { message: "bad".into() },
        exitcode::CONFIG
    )]
    fn given_application_error_when_mapping_then_sysexits_code(
        #[case] error: ApplicationError,
        #[case] expected: i32,
    ) {
        assert_eq!(CliError::from(error).exit_code(), expected);
    }

    #[test]
    fn given_io_failures_when_mapping_then_io_codes() {
        let unwritable = ApplicationError::CannotCreate {
            path: PathBuf::from("/nope/tree.json"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let unreadable = ApplicationError::OperationFailed {
            context: "read data.csv".into(),
            source: Box::new(std::io::Error::from(std::io::ErrorKind::InvalidData)),
        };

        assert_eq!(CliError::from(unwritable).exit_code(), exitcode::CANTCREAT);
        assert_eq!(CliError::from(unreadable).exit_code(), exitcode::IOERR);
    }

    #[test]
    fn given_usage_error_when_mapping_then_usage_code() {
        assert_eq!(CliError::Usage("x".into()).exit_code(), exitcode::USAGE);
    }
}
