use std::collections::BTreeMap;
use std::fmt;

use super::field::Field;
use super::value::Value;

/// Boxed error returned by a failing field producer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resolved parent values handed to a dependency producer, keyed by parent name.
pub type ParentValues = BTreeMap<String, Value>;

pub(crate) type Producer<'r> = Box<dyn Fn(&ParentValues) -> Result<Vec<Field>, BoxError> + 'r>;

/// The ordered, deduplicated parent field names of a dependency rule.
///
/// Converts from a single name or from a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parents(Vec<String>);

impl Parents {
    fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if !out.iter().any(|n| n == name) {
                out.push(name.to_owned());
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Parents {
    fn from(name: &str) -> Self {
        Self(vec![name.to_owned()])
    }
}

impl From<String> for Parents {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<&[&str]> for Parents {
    fn from(names: &[&str]) -> Self {
        Self::from_names(names)
    }
}

impl<const N: usize> From<[&str; N]> for Parents {
    fn from(names: [&str; N]) -> Self {
        Self::from_names(names)
    }
}

impl From<Vec<&str>> for Parents {
    fn from(names: Vec<&str>) -> Self {
        Self::from_names(names)
    }
}

impl From<Vec<String>> for Parents {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(names)
    }
}

/// Anything a dependency producer may return.
///
/// A single field, a list or array of fields, an optional field, or a
/// `Result` of any of these. An `Err` aborts the resolution pass.
pub trait IntoFields {
    /// Normalize into a list of fields.
    ///
    /// # Errors
    ///
    /// Returns the producer's own error when it failed.
    fn into_fields(self) -> Result<Vec<Field>, BoxError>;
}

impl IntoFields for Field {
    fn into_fields(self) -> Result<Vec<Field>, BoxError> {
        Ok(vec![self])
    }
}

impl IntoFields for Vec<Field> {
    fn into_fields(self) -> Result<Vec<Field>, BoxError> {
        Ok(self)
    }
}

impl<const N: usize> IntoFields for [Field; N] {
    fn into_fields(self) -> Result<Vec<Field>, BoxError> {
        Ok(Vec::from(self))
    }
}

impl IntoFields for Option<Field> {
    fn into_fields(self) -> Result<Vec<Field>, BoxError> {
        Ok(self.into_iter().collect())
    }
}

impl<T: IntoFields, E: Into<BoxError>> IntoFields for Result<T, E> {
    fn into_fields(self) -> Result<Vec<Field>, BoxError> {
        self.map_err(Into::into)?.into_fields()
    }
}

/// A registered dependency: parent names plus the producer invoked once all
/// parents have a value.
pub(crate) struct DependencyRule<'r> {
    pub(crate) parents: Vec<String>,
    pub(crate) producer: Producer<'r>,
}

impl fmt::Debug for DependencyRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRule")
            .field("parents", &self.parents)
            .finish_non_exhaustive()
    }
}
