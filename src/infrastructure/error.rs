//! Errors surfacing from the wiring layer

use thiserror::Error;

use crate::application::ApplicationError;

/// Failures raised while services assembled by the container run.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),
}
