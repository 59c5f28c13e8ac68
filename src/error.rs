use thiserror::Error;

use crate::parse::ParseError;
use crate::types::{ConfigError, RehydrateError, ResolveError, SessionError, SubmitError};

/// Unified error type covering every fallible operation of the crate.
///
/// Each component returns its own error type; this enum lets a request
/// handler propagate any of them with `?`.
#[derive(Debug, Error)]
pub enum DependentFieldsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Rehydrate(#[from] RehydrateError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[cfg(feature = "binary-session")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-session")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
