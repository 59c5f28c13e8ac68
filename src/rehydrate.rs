use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::bridge::DataBridge;
use crate::events::{DataRecovered, Events, FieldRehydrate};
use crate::types::{
    AdminContext, ChoiceSource, ContextProvider, Entity, Field, Record, RehydrateError,
    RelationTarget, StoreError, Value,
};

/// A built form: named children with a configuration and a current value.
pub trait Form {
    fn field(&self, name: &str) -> Option<&Field>;

    /// Replace the configuration of the child named `field.name()`.
    fn replace_field(&mut self, field: Field);

    fn value(&self, name: &str) -> Option<&Value>;

    fn set_value(&mut self, name: &str, value: Value);

    fn has(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// A form held in memory, built from resolved fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryForm {
    children: Vec<(Field, Value)>,
}

impl MemoryForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a form with one `Null`-valued child per field. A later field
    /// with a duplicate name replaces the earlier one.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut form = Self::new();
        for field in fields {
            form.replace_field(field);
        }
        form
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(field, _)| field.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|(field, _)| field.name() == name)
    }
}

impl Form for MemoryForm {
    fn field(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|i| &self.children[i].0)
    }

    fn replace_field(&mut self, field: Field) {
        match self.position(field.name()) {
            Some(i) => self.children[i].0 = field,
            None => self.children.push((field, Value::Null)),
        }
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.children[i].1)
    }

    fn set_value(&mut self, name: &str, value: Value) {
        if let Some(i) = self.position(name) {
            self.children[i].1 = value;
        }
    }
}

/// Batch lookup of related records by identifier.
pub trait RelationStore {
    /// Records of `target.class` whose `target.id_field` matches any of `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing store cannot be queried.
    fn find_by_ids(
        &self,
        target: &RelationTarget,
        ids: &[Value],
    ) -> Result<Vec<Arc<Record>>, StoreError>;
}

/// A relation store over in-memory records, grouped by class.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelationStore {
    classes: HashMap<String, Vec<Arc<Record>>>,
}

impl MemoryRelationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, class: &str, record: Record) -> Self {
        self.insert(class, record);
        self
    }

    pub fn insert(&mut self, class: &str, record: Record) {
        self.classes
            .entry(class.to_owned())
            .or_default()
            .push(Arc::new(record));
    }
}

impl RelationStore for MemoryRelationStore {
    fn find_by_ids(
        &self,
        target: &RelationTarget,
        ids: &[Value],
    ) -> Result<Vec<Arc<Record>>, StoreError> {
        let wanted: HashSet<String> = ids.iter().filter_map(Value::identifier).collect();
        let Some(records) = self.classes.get(&target.class) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|record| {
                record
                    .property(&target.id_field)
                    .ok()
                    .and_then(|id| id.identifier())
                    .is_some_and(|id| wanted.contains(&id))
            })
            .cloned()
            .collect())
    }
}

/// Normalize a raw recovered value into resolved relation records.
///
/// `Null` and `""` yield nothing and a record yields itself. Anything else
/// is treated as one or more identifiers and looked up in `store`. In a list,
/// records are kept as they are, ahead of the records found for the
/// remaining identifiers; the store is only asked when identifiers remain.
///
/// # Errors
///
/// Returns [`StoreError`] when the store lookup fails. No matches is not an error.
pub fn normalize_relation_value(
    store: &dyn RelationStore,
    target: &RelationTarget,
    value: &Value,
) -> Result<Vec<Arc<Record>>, StoreError> {
    let (mut records, ids) = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) if s.is_empty() => return Ok(Vec::new()),
        Value::Record(record) => return Ok(vec![Arc::clone(record)]),
        Value::List(items) => {
            let mut records = Vec::new();
            let mut ids = Vec::new();
            for item in items {
                match item {
                    Value::Record(record) => records.push(Arc::clone(record)),
                    id => ids.push(id.clone()),
                }
            }
            (records, ids)
        }
        scalar => (Vec::new(), vec![scalar.clone()]),
    };
    if !ids.is_empty() {
        records.extend(store.find_by_ids(target, &ids)?);
    }
    Ok(records)
}

/// Writes bridged values back onto a freshly built form after a
/// dependency-triggered redirect.
///
/// Runs only on `GET` requests with a non-empty bridge. Without an admin
/// context there is no request to check, so it does nothing either; a host
/// outside the admin (a console command, a worker) never rehydrates.
///
/// Recovered values are written in name order, not submission order, since
/// [`Payload`](crate::Payload) keeps its keys sorted. `FieldRehydrate`
/// handlers therefore see fields alphabetically.
pub struct Rehydrator<'r> {
    bridge: &'r DataBridge<'r>,
    context: Option<&'r AdminContext>,
    store: &'r dyn RelationStore,
    events: Option<&'r Events>,
}

impl<'r> Rehydrator<'r> {
    pub fn new(
        bridge: &'r DataBridge<'r>,
        provider: &'r dyn ContextProvider,
        store: &'r dyn RelationStore,
    ) -> Self {
        Self {
            bridge,
            context: provider.current_context(),
            store,
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: &'r Events) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether this request qualifies for rehydration.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.context
            .is_some_and(|context| context.request().method().is_get())
            && self.bridge.has_data()
    }

    /// Rehydrate `form` from the bridge, returning the names of the fields written.
    ///
    /// Recovered names the form has no child for are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RehydrateError`] when a relation lookup fails.
    pub fn rehydrate(&self, form: &mut dyn Form) -> Result<Vec<String>, RehydrateError> {
        let Some(context) = self.context else {
            return Ok(Vec::new());
        };
        if !context.request().method().is_get() || !self.bridge.has_data() {
            return Ok(Vec::new());
        }

        let payload = self.bridge.data();
        if let Some(events) = self.events {
            events.data_recovered(&DataRecovered {
                context,
                form: &*form,
                payload,
            });
        }

        let mut written = Vec::new();
        for (name, raw) in payload.iter() {
            let Some(field) = form.field(name).cloned() else {
                continue;
            };
            let (field, value) = self.resolve_field(field, name, raw)?;
            if field.kind().is_relation() {
                form.replace_field(field.clone());
            }

            let mut event = FieldRehydrate {
                context,
                field: &field,
                name,
                value,
            };
            if let Some(events) = self.events {
                events.field_rehydrate(&mut event);
            }
            debug!(form = context.entity_name(), field = %name, value = %event.value, "rehydrated field");
            form.set_value(name, event.value);
            written.push(name.clone());
        }
        Ok(written)
    }

    fn resolve_field(
        &self,
        field: Field,
        name: &str,
        raw: &Value,
    ) -> Result<(Field, Value), RehydrateError> {
        let kind = field.kind();
        let target = match field.relation_target() {
            Some(target) if kind.is_relation() => target.clone(),
            _ => return Ok((field, raw.clone())),
        };

        let records = normalize_relation_value(self.store, &target, raw).map_err(|source| {
            RehydrateError::Store {
                field: name.to_owned(),
                source,
            }
        })?;
        let value = if kind.is_multiple() {
            Value::List(records.iter().cloned().map(Value::Record).collect())
        } else {
            records.first().cloned().map_or(Value::Null, Value::Record)
        };
        Ok((field.with_choices(ChoiceSource::Fixed(records)), value))
    }
}

impl fmt::Debug for Rehydrator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rehydrator")
            .field("bridge", &self.bridge)
            .field("context", &self.context)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
