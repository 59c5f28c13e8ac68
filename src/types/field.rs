use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::value::{Record, Value};

/// How a field's value is interpreted when it is rehydrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    /// A plain value: text, number, choice of literals.
    #[default]
    Scalar,
    /// A chooser over related records, holding at most one.
    RelationSingle,
    /// A chooser over related records, holding any number.
    RelationMulti,
}

impl FieldKind {
    #[must_use]
    pub fn is_relation(self) -> bool {
        matches!(self, FieldKind::RelationSingle | FieldKind::RelationMulti)
    }

    #[must_use]
    pub fn is_multiple(self) -> bool {
        matches!(self, FieldKind::RelationMulti)
    }
}

/// The record class a relation field chooses from, and the attribute that
/// identifies its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTarget {
    pub class: String,
    pub id_field: String,
}

/// Where a relation field gets its choices from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChoiceSource {
    /// Loaded by querying the backing store when the widget renders.
    #[default]
    Query,
    /// Loaded on demand by the widget as the user types.
    Autocomplete,
    /// An explicit, already-resolved set of records.
    Fixed(Vec<Arc<Record>>),
}

/// Which pages a field is rendered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Everywhere,
    FormsOnly,
}

/// A form field descriptor.
///
/// Descriptors are built by the host and passed through the resolver
/// untouched; the resolver only builds one of its own, the hidden state field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    label: Option<String>,
    kind: FieldKind,
    relation: Option<RelationTarget>,
    choices: ChoiceSource,
    hidden: bool,
    mapped: bool,
    visibility: Visibility,
    data: Option<String>,
    options: BTreeMap<String, Value>,
}

impl Field {
    /// A scalar field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind: FieldKind::Scalar,
            relation: None,
            choices: ChoiceSource::Query,
            hidden: false,
            mapped: true,
            visibility: Visibility::Everywhere,
            data: None,
            options: BTreeMap::new(),
        }
    }

    /// A hidden scalar field.
    pub fn hidden(name: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::new(name)
        }
    }

    /// A single-select relation over records of `class`, identified by `id`.
    pub fn relation(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::RelationSingle,
            relation: Some(RelationTarget {
                class: class.into(),
                id_field: "id".to_owned(),
            }),
            ..Self::new(name)
        }
    }

    /// A multi-select relation over records of `class`, identified by `id`.
    pub fn relation_multi(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::RelationMulti,
            ..Self::relation(name, class)
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Change the attribute that identifies related records. No effect on scalar fields.
    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        if let Some(target) = &mut self.relation {
            target.id_field = id_field.into();
        }
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: ChoiceSource) -> Self {
        self.choices = choices;
        self
    }

    #[must_use]
    pub fn autocomplete(self) -> Self {
        self.with_choices(ChoiceSource::Autocomplete)
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_owned(), value.into());
        self
    }

    /// Exclude the field from the bound entity: its submitted value is not written back.
    #[must_use]
    pub fn unmapped(mut self) -> Self {
        self.mapped = false;
        self
    }

    #[must_use]
    pub fn only_on_forms(mut self) -> Self {
        self.visibility = Visibility::FormsOnly;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn relation_target(&self) -> Option<&RelationTarget> {
        self.relation.as_ref()
    }

    #[must_use]
    pub fn choices(&self) -> &ChoiceSource {
        &self.choices
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[must_use]
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FieldKind::Scalar => write!(f, "{}", self.name),
            FieldKind::RelationSingle => write!(f, "{} -> one", self.name),
            FieldKind::RelationMulti => write!(f, "{} -> many", self.name),
        }
    }
}
