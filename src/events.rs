use std::fmt;

use crate::rehydrate::Form;
use crate::submit::Redirect;
use crate::types::{AdminContext, Field, Payload, StateSnapshot, Value};

/// Bridged data was found while building a form on a `GET` request.
///
/// Dispatched once, before any field is rehydrated.
pub struct DataRecovered<'a> {
    pub context: &'a AdminContext,
    pub form: &'a dyn Form,
    pub payload: &'a Payload,
}

/// A recovered value is about to be written onto a form field.
///
/// `value` is the output: whatever it holds after the last handler runs is
/// written to the field.
pub struct FieldRehydrate<'a> {
    pub context: &'a AdminContext,
    pub field: &'a Field,
    pub name: &'a str,
    pub value: Value,
}

/// A resolution pass completed. Handlers may rewrite `fields`.
#[derive(Debug)]
pub struct FieldsResolved {
    pub fields: Vec<Field>,
}

/// The state snapshot is about to be encoded into the hidden state field.
#[derive(Debug)]
pub struct StateCreating<'a> {
    pub snapshot: &'a mut StateSnapshot,
}

/// A submission changed at least one parent value and is being redirected.
///
/// `response` is the output: handlers may replace the redirect.
pub struct DependencyChanged<'a> {
    pub context: &'a AdminContext,
    pub submitted: &'a Payload,
    pub changed: &'a [String],
    pub response: Redirect,
}

type DataRecoveredHandler = Box<dyn Fn(&DataRecovered<'_>)>;
type FieldRehydrateHandler = Box<dyn Fn(&mut FieldRehydrate<'_>)>;
type FieldsResolvedHandler = Box<dyn Fn(&mut FieldsResolved)>;
type StateCreatingHandler = Box<dyn Fn(&mut StateCreating<'_>)>;
type DependencyChangedHandler = Box<dyn Fn(&mut DependencyChanged<'_>)>;

/// Registered notification handlers.
///
/// Handlers run synchronously in registration order. A panicking handler
/// is not caught.
#[derive(Default)]
pub struct Events {
    data_recovered: Vec<DataRecoveredHandler>,
    field_rehydrate: Vec<FieldRehydrateHandler>,
    fields_resolved: Vec<FieldsResolvedHandler>,
    state_creating: Vec<StateCreatingHandler>,
    dependency_changed: Vec<DependencyChangedHandler>,
}

impl Events {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_data_recovered(mut self, handler: impl Fn(&DataRecovered<'_>) + 'static) -> Self {
        self.data_recovered.push(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_field_rehydrate(
        mut self,
        handler: impl Fn(&mut FieldRehydrate<'_>) + 'static,
    ) -> Self {
        self.field_rehydrate.push(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_fields_resolved(mut self, handler: impl Fn(&mut FieldsResolved) + 'static) -> Self {
        self.fields_resolved.push(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_state_creating(mut self, handler: impl Fn(&mut StateCreating<'_>) + 'static) -> Self {
        self.state_creating.push(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_dependency_changed(
        mut self,
        handler: impl Fn(&mut DependencyChanged<'_>) + 'static,
    ) -> Self {
        self.dependency_changed.push(Box::new(handler));
        self
    }

    pub(crate) fn data_recovered(&self, event: &DataRecovered<'_>) {
        for handler in &self.data_recovered {
            handler(event);
        }
    }

    pub(crate) fn field_rehydrate(&self, event: &mut FieldRehydrate<'_>) {
        for handler in &self.field_rehydrate {
            handler(event);
        }
    }

    pub(crate) fn fields_resolved(&self, event: &mut FieldsResolved) {
        for handler in &self.fields_resolved {
            handler(event);
        }
    }

    pub(crate) fn state_creating(&self, event: &mut StateCreating<'_>) {
        for handler in &self.state_creating {
            handler(event);
        }
    }

    pub(crate) fn dependency_changed(&self, event: &mut DependencyChanged<'_>) {
        for handler in &self.dependency_changed {
            handler(event);
        }
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("data_recovered", &self.data_recovered.len())
            .field("field_rehydrate", &self.field_rehydrate.len())
            .field("fields_resolved", &self.fields_resolved.len())
            .field("state_creating", &self.state_creating.len())
            .field("dependency_changed", &self.dependency_changed.len())
            .finish()
    }
}
