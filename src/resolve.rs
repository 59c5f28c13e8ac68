use std::fmt;
use std::iter::FusedIterator;

use tracing::trace;

use crate::bridge::DataBridge;
use crate::config::ResolverConfig;
use crate::events::{Events, FieldsResolved, StateCreating};
use crate::lookup::ValueLookup;
use crate::types::{
    ConfigError, ContextProvider, DependencyRule, Field, IntoFields, ParentRegistry, ParentValues,
    Parents, ResolveError, StateSnapshot, Value,
};

/// Builder for a [`Resolver`].
///
/// Independent fields are set once with
/// [`configure_fields`](Self::configure_fields); dependent fields are declared
/// with one [`depends_on`](Self::depends_on) call per rule. Rules resolve in
/// declaration order.
///
/// # Example
///
/// ```
/// use dependent_fields::{
///     AdminContext, DataBridge, Field, MemorySession, Resolver, ResolverConfig,
/// };
///
/// let config = ResolverConfig::default();
/// let session = MemorySession::new();
/// let bridge = DataBridge::new(&session, &config);
/// let context: Option<AdminContext> = None;
///
/// let resolver = Resolver::builder(&bridge, &context)
///     .configure_fields(|| [Field::new("Name"), Field::new("Category")])
///     .depends_on("Category", |values| {
///         Field::new("Subcategory").with_option("category", values["Category"].clone())
///     })
///     .build()
///     .unwrap();
///
/// let names: Vec<String> = resolver
///     .resolve()
///     .map(|f| f.unwrap().name().to_owned())
///     .collect();
/// assert_eq!(names, ["Name", "Category", "__resolver_state"]);
/// ```
pub struct ResolverBuilder<'r> {
    lookup: ValueLookup<'r>,
    events: Option<&'r Events>,
    state_field: String,
    independent: Vec<Field>,
    rules: Vec<DependencyRule<'r>>,
    parents: ParentRegistry,
    error: Option<ConfigError>,
}

impl<'r> ResolverBuilder<'r> {
    #[must_use]
    pub fn with_events(mut self, events: &'r Events) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &ResolverConfig) -> Self {
        self.state_field.clone_from(&config.state_field);
        self
    }

    /// Replace the independent fields with the result of calling `producer` once.
    #[must_use]
    pub fn configure_fields<I>(mut self, producer: impl FnOnce() -> I) -> Self
    where
        I: IntoIterator<Item = Field>,
    {
        self.independent = producer().into_iter().collect();
        self
    }

    /// Declare fields that only appear once every parent has a value.
    ///
    /// `producer` receives the resolved value of each parent and may return a
    /// single field, several, none, or an error. A rule with no parents or a
    /// blank parent name makes [`build`](Self::build) fail.
    #[must_use]
    pub fn depends_on<F, R>(mut self, parents: impl Into<Parents>, producer: F) -> Self
    where
        F: Fn(&ParentValues) -> R + 'r,
        R: IntoFields,
    {
        let parents = parents.into().into_vec();
        let rule = self.rules.len();
        if self.error.is_none() {
            if parents.is_empty() {
                self.error = Some(ConfigError::EmptyParents { rule });
            } else if parents.iter().any(|name| name.trim().is_empty()) {
                self.error = Some(ConfigError::BlankParent { rule });
            }
        }

        for name in &parents {
            self.parents.register(name);
        }
        self.rules.push(DependencyRule {
            parents,
            producer: Box::new(move |values| producer(values).into_fields()),
        });
        self
    }

    /// Finish configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] recorded while rules were declared.
    pub fn build(self) -> Result<Resolver<'r>, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Resolver {
            lookup: self.lookup,
            events: self.events,
            state_field: self.state_field,
            independent: self.independent,
            rules: self.rules,
            parents: self.parents,
        })
    }
}

impl fmt::Debug for ResolverBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("independent", &self.independent)
            .field("rules", &self.rules)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Resolves the fields of one form for the current request.
///
/// Borrows the request's bridge and admin context, so it cannot outlive the
/// request that built it.
pub struct Resolver<'r> {
    lookup: ValueLookup<'r>,
    events: Option<&'r Events>,
    state_field: String,
    independent: Vec<Field>,
    rules: Vec<DependencyRule<'r>>,
    parents: ParentRegistry,
}

impl<'r> Resolver<'r> {
    pub fn builder(
        bridge: &'r DataBridge<'r>,
        provider: &'r dyn ContextProvider,
    ) -> ResolverBuilder<'r> {
        ResolverBuilder {
            lookup: ValueLookup::new(bridge, provider.current_context()),
            events: None,
            state_field: ResolverConfig::default().state_field,
            independent: Vec::new(),
            rules: Vec::new(),
            parents: ParentRegistry::new(),
            error: None,
        }
    }

    /// Start a resolution pass.
    ///
    /// Yields the independent fields, then the fields of every rule whose
    /// parents all have a value, then the hidden state field. Parent values
    /// are looked up as the pass reaches each rule; nothing is cached between
    /// passes.
    #[must_use]
    pub fn resolve(&self) -> Resolution<'_, 'r> {
        Resolution {
            resolver: self,
            stage: Stage::Independent(0),
            pending: Vec::new().into_iter(),
        }
    }

    /// Run a full pass and hand the result to `FieldsResolved` handlers.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolveError`] of the pass.
    pub fn fields(&self) -> Result<Vec<Field>, ResolveError> {
        let mut event = FieldsResolved {
            fields: self.resolve().collect::<Result<_, _>>()?,
        };
        if let Some(events) = self.events {
            events.fields_resolved(&mut event);
        }
        Ok(event.fields)
    }

    /// Current value of `name`, see [`ValueLookup::get_value`].
    #[must_use]
    pub fn get_value(&self, name: &str, default: Value) -> Value {
        self.lookup.get_value(name, default)
    }

    /// Every parent name referenced by any rule.
    #[must_use]
    pub fn monitored_parents(&self) -> &ParentRegistry {
        &self.parents
    }

    #[must_use]
    pub fn state_field_name(&self) -> &str {
        &self.state_field
    }

    fn fire(&self, rule: &DependencyRule<'r>) -> Result<Option<Vec<Field>>, ResolveError> {
        let mut values = ParentValues::new();
        for parent in &rule.parents {
            let value = self.lookup.get_value(parent, Value::Null);
            if !value.is_satisfied() {
                trace!(parent = %parent, "parent has no value, skipping rule");
                return Ok(None);
            }
            values.insert(parent.clone(), value);
        }

        (rule.producer)(&values)
            .map(Some)
            .map_err(|source| ResolveError::Producer {
                parents: rule.parents.clone(),
                source,
            })
    }

    fn state_field(&self) -> Result<Field, ResolveError> {
        let mut snapshot = StateSnapshot::new();
        for parent in self.parents.iter() {
            snapshot.insert(parent, self.lookup.get_value(parent, Value::Null));
        }
        if let Some(events) = self.events {
            events.state_creating(&mut StateCreating {
                snapshot: &mut snapshot,
            });
        }
        Ok(Field::hidden(self.state_field.as_str())
            .with_data(snapshot.encode()?)
            .unmapped()
            .only_on_forms())
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state_field", &self.state_field)
            .field("independent", &self.independent)
            .field("rules", &self.rules)
            .field("parents", &self.parents)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Independent(usize),
    Rules(usize),
    State,
    Done,
}

/// One lazy resolution pass, see [`Resolver::resolve`].
///
/// After an error the iterator is exhausted.
pub struct Resolution<'a, 'r> {
    resolver: &'a Resolver<'r>,
    stage: Stage,
    pending: std::vec::IntoIter<Field>,
}

impl Iterator for Resolution<'_, '_> {
    type Item = Result<Field, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(field) = self.pending.next() {
                return Some(Ok(field));
            }
            match self.stage {
                Stage::Independent(i) => match self.resolver.independent.get(i) {
                    Some(field) => {
                        self.stage = Stage::Independent(i + 1);
                        return Some(Ok(field.clone()));
                    }
                    None => self.stage = Stage::Rules(0),
                },
                Stage::Rules(i) => {
                    let Some(rule) = self.resolver.rules.get(i) else {
                        self.stage = Stage::State;
                        continue;
                    };
                    self.stage = Stage::Rules(i + 1);
                    match self.resolver.fire(rule) {
                        Ok(Some(fields)) => self.pending = fields.into_iter(),
                        Ok(None) => {}
                        Err(err) => {
                            self.stage = Stage::Done;
                            return Some(Err(err));
                        }
                    }
                }
                Stage::State => {
                    self.stage = Stage::Done;
                    return Some(self.resolver.state_field());
                }
                Stage::Done => return None,
            }
        }
    }
}

impl FusedIterator for Resolution<'_, '_> {}

impl fmt::Debug for Resolution<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("stage", &self.stage)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::bridge::{MemorySession, NoSession, Session};
    use crate::types::{AdminContext, FormData, Payload, Request, Visibility};

    fn names(resolver: &Resolver<'_>) -> Vec<String> {
        resolver
            .resolve()
            .map(|f| f.unwrap().name().to_owned())
            .collect()
    }

    fn product(category: Option<&str>) -> Option<AdminContext> {
        let mut form = FormData::new().with("Product", "Name", "Lamp");
        if let Some(category) = category {
            form = form.with("Product", "Category", category);
        }
        Some(AdminContext::new("Product", Request::post(form)))
    }

    #[test]
    fn unsatisfied_parent_skips_rule() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(None);
        let resolver = Resolver::builder(&bridge, &ctx)
            .configure_fields(|| [Field::new("Name"), Field::new("Category")])
            .depends_on("Category", |_| Field::new("Subcategory"))
            .build()
            .unwrap();
        assert_eq!(names(&resolver), ["Name", "Category", "__resolver_state"]);
    }

    #[test]
    fn satisfied_parent_fires_rule() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .configure_fields(|| [Field::new("Name"), Field::new("Category")])
            .depends_on("Category", |values| {
                assert_eq!(values["Category"], Value::from("books"));
                Field::new("Subcategory")
            })
            .build()
            .unwrap();
        assert_eq!(
            names(&resolver),
            ["Name", "Category", "Subcategory", "__resolver_state"]
        );
    }

    #[test]
    fn empty_string_is_unsatisfied() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some(""));
        let calls = Cell::new(0);
        let resolver = Resolver::builder(&bridge, &ctx)
            .depends_on("Category", |_| {
                calls.set(calls.get() + 1);
                Field::new("Subcategory")
            })
            .build()
            .unwrap();
        assert_eq!(names(&resolver), ["__resolver_state"]);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn every_parent_must_be_satisfied() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .depends_on(["Category", "Brand"], |_| Field::new("Model"))
            .depends_on(["Category", "Name"], |values| {
                assert_eq!(values.len(), 2);
                Field::new("Shelf")
            })
            .build()
            .unwrap();
        assert_eq!(names(&resolver), ["Shelf", "__resolver_state"]);
    }

    #[test]
    fn rules_resolve_in_declaration_order() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .depends_on("Name", |_| vec![Field::new("b1"), Field::new("b2")])
            .depends_on("Category", |_| None::<Field>)
            .depends_on("Category", |_| [Field::new("a")])
            .build()
            .unwrap();
        assert_eq!(names(&resolver), ["b1", "b2", "a", "__resolver_state"]);
    }

    #[test]
    fn state_field_records_every_parent() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .depends_on(["Category", "Brand"], |_| Field::new("Model"))
            .depends_on("Category", |_| Field::new("Subcategory"))
            .build()
            .unwrap();

        let state = resolver.resolve().last().unwrap().unwrap();
        assert!(state.is_hidden());
        assert!(!state.is_mapped());
        assert_eq!(state.visibility(), Visibility::FormsOnly);
        let snapshot = StateSnapshot::decode(state.data().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("Category"), Some(&Value::from("books")));
        assert_eq!(snapshot.get("Brand"), Some(&Value::Null));
    }

    #[test]
    fn producer_error_fuses_pass() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .configure_fields(|| [Field::new("Name")])
            .depends_on("Category", |_| Err::<Field, _>("catalog offline"))
            .depends_on("Name", |_| Field::new("never"))
            .build()
            .unwrap();

        let mut pass = resolver.resolve();
        assert_eq!(pass.next().unwrap().unwrap().name(), "Name");
        let err = pass.next().unwrap().unwrap_err();
        assert_eq!(
            err.to_string(),
            "producer for fields depending on [Category] failed: catalog offline"
        );
        assert!(pass.next().is_none());
        assert!(resolver.fields().is_err());
    }

    #[test]
    fn empty_parents_rejected_at_build() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx: Option<AdminContext> = None;
        let err = Resolver::builder(&bridge, &ctx)
            .depends_on("Category", |_| Field::new("ok"))
            .depends_on(Vec::<String>::new(), |_| Field::new("bad"))
            .depends_on(["", "x"], |_| Field::new("worse"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyParents { rule: 1 }));
    }

    #[test]
    fn blank_parent_rejected_at_build() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx: Option<AdminContext> = None;
        let err = Resolver::builder(&bridge, &ctx)
            .depends_on("  ", |_| Field::new("bad"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::BlankParent { rule: 0 }));
    }

    #[test]
    fn configure_fields_replaces() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx: Option<AdminContext> = None;
        let resolver = Resolver::builder(&bridge, &ctx)
            .configure_fields(|| [Field::new("old")])
            .configure_fields(|| vec![Field::new("new")])
            .build()
            .unwrap();
        assert_eq!(names(&resolver), ["new", "__resolver_state"]);
    }

    #[test]
    fn bridge_drives_resolution() {
        let cfg = ResolverConfig::default();
        let session = MemorySession::new();
        session
            .set(&cfg.session_key, Payload::new().with("Category", "music"))
            .unwrap();
        let bridge = DataBridge::new(&session, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .depends_on("Category", |values| {
                Field::new("Subcategory").with_option("category", values["Category"].clone())
            })
            .depends_on("Name", |_| Field::new("Slug"))
            .build()
            .unwrap();

        let fields = resolver.fields().unwrap();
        assert_eq!(fields[0].option("category"), Some(&Value::from("music")));
        // Name lives in the live submission only, hidden behind the bridge.
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn configured_state_field_name() {
        let cfg = ResolverConfig {
            state_field: "_deps".into(),
            ..ResolverConfig::default()
        };
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx: Option<AdminContext> = None;
        let resolver = Resolver::builder(&bridge, &ctx)
            .with_config(&cfg)
            .build()
            .unwrap();
        assert_eq!(resolver.state_field_name(), "_deps");
        assert_eq!(names(&resolver), ["_deps"]);
    }

    #[test]
    fn handlers_amend_state_and_fields() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let events = Events::new()
            .on_state_creating(|e| e.snapshot.insert("Audit", Value::Bool(true)))
            .on_fields_resolved(|e| e.fields.retain(|f| f.name() != "Name"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .with_events(&events)
            .configure_fields(|| [Field::new("Name"), Field::new("Category")])
            .depends_on("Category", |_| Field::new("Subcategory"))
            .build()
            .unwrap();

        let fields = resolver.fields().unwrap();
        let names: Vec<_> = fields.iter().map(Field::name).collect();
        assert_eq!(names, ["Category", "Subcategory", "__resolver_state"]);
        let snapshot = StateSnapshot::decode(fields[2].data().unwrap()).unwrap();
        assert_eq!(snapshot.get("Audit"), Some(&Value::Bool(true)));
    }

    #[test]
    fn passes_are_independent() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = product(Some("books"));
        let resolver = Resolver::builder(&bridge, &ctx)
            .configure_fields(|| [Field::new("Name")])
            .depends_on("Category", |_| Field::new("Subcategory"))
            .build()
            .unwrap();
        assert_eq!(resolver.fields().unwrap(), resolver.fields().unwrap());
        assert_eq!(resolver.monitored_parents().iter().collect::<Vec<_>>(), ["Category"]);
    }
}
