//! Dependent form-field resolution for admin record editors.
//!
//! A [`Resolver`] yields a form's fields: the independent ones, then the
//! fields of every dependency rule whose parent fields all have a value,
//! then a hidden state field recording those parent values. When a
//! submission changes a parent, [`SubmissionInterceptor`] stashes it in the
//! [`DataBridge`] and redirects; on the following `GET` the resolver reads
//! parent values from the bridge and [`Rehydrator`] writes the submitted
//! values back onto the rebuilt form.

mod bridge;
mod config;
mod error;
mod events;
mod lookup;
pub mod parse;
mod rehydrate;
mod resolve;
#[cfg(feature = "binary-session")]
pub mod serial;
mod submit;
mod types;

pub use bridge::{DataBridge, MemorySession, NoSession, Session};
pub use config::{ResolverConfig, DEFAULT_SESSION_KEY, DEFAULT_STATE_FIELD};
pub use error::DependentFieldsError;
pub use events::{
    DataRecovered, DependencyChanged, Events, FieldRehydrate, FieldsResolved, StateCreating,
};
pub use lookup::ValueLookup;
pub use parse::{parse_form_body, ParseError};
pub use rehydrate::{
    normalize_relation_value, Form, MemoryForm, MemoryRelationStore, RelationStore, Rehydrator,
};
pub use resolve::{Resolution, Resolver, ResolverBuilder};
pub use submit::{Redirect, SubmissionInterceptor};
pub use types::{
    AdminContext, BoxError, ChoiceSource, ConfigError, ContextProvider, Entity, Field, FieldKind,
    FormData, IntoFields, Method, Page, ParentRegistry, ParentValues, Parents, Payload,
    PropertyError, Record, RehydrateError, RelationTarget, Request, ResolveError, SessionError,
    StateSnapshot, StoreError, SubmitError, Value, Visibility,
};
