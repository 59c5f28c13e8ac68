mod context;
mod error;
mod field;
mod parents;
mod payload;
mod rule;
mod snapshot;
mod value;

pub use context::{AdminContext, ContextProvider, Entity, FormData, Method, Page, Request};
pub use error::{
    ConfigError, PropertyError, RehydrateError, ResolveError, SessionError, StoreError,
    SubmitError,
};
pub use field::{ChoiceSource, Field, FieldKind, RelationTarget, Visibility};
pub use parents::ParentRegistry;
pub use payload::Payload;
pub(crate) use rule::DependencyRule;
pub use rule::{BoxError, IntoFields, ParentValues, Parents};
pub use snapshot::StateSnapshot;
pub use value::{Record, Value};
