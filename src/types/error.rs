use thiserror::Error;

use super::rule::BoxError;

/// A dependency rule was registered in violation of the builder's contract.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("dependency rule #{rule} declares no parent fields")]
    EmptyParents { rule: usize },

    #[error("dependency rule #{rule} declares a blank parent field name")]
    BlankParent { rule: usize },
}

/// A resolution pass was aborted.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("producer for fields depending on [{}] failed: {source}", parents.join(", "))]
    Producer {
        parents: Vec<String>,
        #[source]
        source: BoxError,
    },

    #[error("failed to encode resolver state: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// The session backing the redirect bridge could not be used.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session")]
    Unavailable,

    #[error("session backend failure: {0}")]
    Backend(String),
}

/// An entity property could not be read.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property '{property}' does not exist")]
    Missing { property: String },

    #[error("property '{property}' is not readable: {reason}")]
    Unreadable { property: String, reason: String },
}

/// A relation store lookup failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lookup of '{class}' records failed: {reason}")]
    Lookup { class: String, reason: String },
}

/// Rehydrating a recovered value onto the form failed.
#[derive(Debug, Error)]
pub enum RehydrateError {
    #[error("failed to rehydrate field '{field}': {source}")]
    Store {
        field: String,
        #[source]
        source: StoreError,
    },
}

/// Intercepting a submission for a dependency-triggered redirect failed.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("malformed resolver state in submission: {0}")]
    State(#[source] serde_json::Error),

    #[error("could not bridge submission across redirect: {0}")]
    Persist(#[from] SessionError),
}
