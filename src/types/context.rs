use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::PropertyError;
use super::payload::Payload;
use super::value::{Record, Value};

/// HTTP request method of the current admin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn is_get(self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Admin CRUD pages. Only `Edit` and `New` render a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Index,
    Detail,
    Edit,
    New,
}

impl Page {
    #[must_use]
    pub fn is_form(self) -> bool {
        matches!(self, Page::Edit | Page::New)
    }
}

/// Submitted form data, namespaced by form name.
///
/// A body like `Product[name]=Lamp` lands under namespace `"Product"`;
/// keys without brackets land under [`FormData::ROOT`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    forms: BTreeMap<String, Payload>,
}

impl FormData {
    /// Namespace for keys submitted without a form prefix.
    pub const ROOT: &'static str = "";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a submitted value under `form`, builder style.
    #[must_use]
    pub fn with(mut self, form: &str, name: &str, value: impl Into<Value>) -> Self {
        self.namespace_mut(form).set(name, value);
        self
    }

    #[must_use]
    pub fn namespace(&self, form: &str) -> Option<&Payload> {
        self.forms.get(form)
    }

    pub fn namespace_mut(&mut self, form: &str) -> &mut Payload {
        self.forms.entry(form.to_owned()).or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

/// The parts of the current HTTP request the resolver reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    form_data: FormData,
}

impl Request {
    pub fn new(method: Method, form_data: FormData) -> Self {
        Self { method, form_data }
    }

    /// A `GET` request with no submitted data.
    pub fn get() -> Self {
        Self::new(Method::Get, FormData::new())
    }

    pub fn post(form_data: FormData) -> Self {
        Self::new(Method::Post, form_data)
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn form_data(&self) -> &FormData {
        &self.form_data
    }

    /// Data submitted under the given form name, if any.
    #[must_use]
    pub fn submitted(&self, form: &str) -> Option<&Payload> {
        self.form_data.namespace(form)
    }
}

/// A persisted record whose properties can be read by name.
pub trait Entity: fmt::Debug {
    /// Read a property.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError`] when the property does not exist or cannot be read.
    fn property(&self, name: &str) -> Result<Value, PropertyError>;
}

impl Entity for Record {
    fn property(&self, name: &str) -> Result<Value, PropertyError> {
        if let Some(value) = self.attribute(name) {
            return Ok(value.clone());
        }
        if name == "id" {
            return Ok(self.id().clone());
        }
        Err(PropertyError::Missing {
            property: name.to_owned(),
        })
    }
}

/// The admin request currently being handled: which entity form is shown,
/// the record being edited, and the HTTP request.
#[derive(Debug, Clone)]
pub struct AdminContext {
    entity_name: String,
    instance: Option<Arc<dyn Entity>>,
    request: Request,
}

impl AdminContext {
    /// `entity_name` doubles as the form name submitted data is namespaced under.
    pub fn new(entity_name: impl Into<String>, request: Request) -> Self {
        Self {
            entity_name: entity_name.into(),
            instance: None,
            request,
        }
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Entity + 'static) -> Self {
        self.instance = Some(Arc::new(instance));
        self
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    #[must_use]
    pub fn instance(&self) -> Option<&dyn Entity> {
        self.instance.as_deref()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// Supplies the admin context of the current request, if there is one.
pub trait ContextProvider {
    fn current_context(&self) -> Option<&AdminContext>;
}

impl ContextProvider for AdminContext {
    fn current_context(&self) -> Option<&AdminContext> {
        Some(self)
    }
}

impl ContextProvider for Option<AdminContext> {
    fn current_context(&self) -> Option<&AdminContext> {
        self.as_ref()
    }
}
