use std::fmt;

use tracing::debug;

use crate::bridge::DataBridge;
use crate::config::ResolverConfig;
use crate::events::{DependencyChanged, Events};
use crate::types::{AdminContext, ContextProvider, Payload, StateSnapshot, SubmitError, Value};

/// Where to send the browser after a dependency change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "redirect to {}", self.location)
    }
}

/// Detects submissions that changed a parent field and routes them through
/// the redirect bridge instead of saving.
///
/// The submitted state field tells which parent values the form was built
/// from. When any submitted parent differs, the dependent fields on screen
/// are stale: the submission is bridged and the form is rebuilt on the
/// redirected `GET`.
pub struct SubmissionInterceptor<'r> {
    bridge: &'r DataBridge<'r>,
    context: Option<&'r AdminContext>,
    events: Option<&'r Events>,
    state_field: String,
}

impl<'r> SubmissionInterceptor<'r> {
    pub fn new(
        bridge: &'r DataBridge<'r>,
        provider: &'r dyn ContextProvider,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            bridge,
            context: provider.current_context(),
            events: None,
            state_field: config.state_field.clone(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: &'r Events) -> Self {
        self.events = Some(events);
        self
    }

    /// Parents whose submitted value differs from the rendered state.
    ///
    /// Empty for `GET` requests and for submissions without a state field.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::State`] when the state field is not a valid snapshot.
    pub fn changed_parents(&self) -> Result<Vec<String>, SubmitError> {
        let Some((_, submitted, state)) = self.submission() else {
            return Ok(Vec::new());
        };
        let snapshot = StateSnapshot::decode(state).map_err(SubmitError::State)?;
        Ok(snapshot
            .iter()
            .filter(|(name, rendered)| {
                let current = submitted.get(name.as_str()).unwrap_or(&Value::Null);
                fingerprint(current) != fingerprint(rendered)
            })
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Bridge the submission and return a redirect if a parent changed.
    ///
    /// Returns `None` when nothing changed and the caller should save as usual.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] when the state field is malformed or the
    /// submission cannot be written to the session.
    pub fn intercept(&self, location: impl Into<String>) -> Result<Option<Redirect>, SubmitError> {
        let changed = self.changed_parents()?;
        if changed.is_empty() {
            return Ok(None);
        }
        let Some((context, submitted, _)) = self.submission() else {
            return Ok(None);
        };

        let mut payload = submitted.clone();
        payload.remove(&self.state_field);
        self.bridge.persist(payload.clone())?;
        debug!(form = context.entity_name(), changed = ?changed, "parent field changed, redirecting");

        let mut event = DependencyChanged {
            context,
            submitted: &payload,
            changed: &changed,
            response: Redirect::new(location),
        };
        if let Some(events) = self.events {
            events.dependency_changed(&mut event);
        }
        Ok(Some(event.response))
    }

    fn submission(&self) -> Option<(&'r AdminContext, &'r Payload, &'r str)> {
        let context = self.context?;
        if context.request().method().is_get() {
            return None;
        }
        let submitted = context.request().submitted(context.entity_name())?;
        let state = submitted.get(&self.state_field)?.as_str()?;
        Some((context, submitted, state))
    }
}

impl fmt::Debug for SubmissionInterceptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionInterceptor")
            .field("context", &self.context)
            .field("state_field", &self.state_field)
            .finish_non_exhaustive()
    }
}

/// Comparable text of a value as a browser would submit it.
///
/// An unchecked checkbox and an empty multi-select submit nothing, so
/// `false` and `[]` coincide with `Null` and `""`. Numbers and their text
/// coincide, records compare by identifier.
fn fingerprint(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_owned(),
        Value::List(items) if items.is_empty() => String::new(),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(fingerprint).collect();
            format!("[{}]", parts.join("\u{1f}"))
        }
        other => other.identifier().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MemorySession, NoSession};
    use crate::types::{FormData, Record, Request};

    #[test]
    fn fingerprints() {
        assert_eq!(fingerprint(&Value::Null), fingerprint(&Value::from("")));
        assert_eq!(fingerprint(&Value::Int(3)), fingerprint(&Value::from("3")));
        assert_eq!(
            fingerprint(&Value::from(Record::new(3_i64))),
            fingerprint(&Value::from("3"))
        );
        assert_ne!(fingerprint(&Value::from("3")), fingerprint(&Value::from("4")));
        assert_eq!(
            fingerprint(&Value::from(vec![1_i64, 2_i64])),
            fingerprint(&Value::from(vec!["1", "2"]))
        );
        assert_ne!(
            fingerprint(&Value::from(vec!["1,2"])),
            fingerprint(&Value::from(vec!["1", "2"]))
        );
    }

    #[test]
    fn unsubmitted_false_and_empty_list_match_missing_key() {
        assert_eq!(fingerprint(&Value::Bool(false)), fingerprint(&Value::Null));
        assert_eq!(fingerprint(&Value::List(Vec::new())), fingerprint(&Value::Null));
        assert_ne!(fingerprint(&Value::Bool(true)), fingerprint(&Value::Null));
        assert_ne!(
            fingerprint(&Value::from(vec![""])),
            fingerprint(&Value::List(Vec::new()))
        );
    }

    /// Render the state field for a saved record the way a `GET` would.
    fn rendered_state(saved: Record) -> String {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = AdminContext::new("Product", Request::get()).with_instance(saved);
        let fields = crate::resolve::Resolver::builder(&bridge, &ctx)
            .depends_on("Flag", |_| crate::types::Field::new("FlagNotes"))
            .build()
            .unwrap()
            .fields()
            .unwrap();
        fields.last().unwrap().data().unwrap().to_owned()
    }

    #[test]
    fn untouched_false_or_empty_parent_is_not_a_change() {
        let cfg = ResolverConfig::default();
        for flag in [Value::Bool(false), Value::List(Vec::new())] {
            let saved = Record::new(1_i64).with("Name", "x").with("Flag", flag.clone());
            let state = rendered_state(saved.clone());

            let session = MemorySession::new();
            let bridge = DataBridge::new(&session, &cfg);
            let ctx = AdminContext::new(
                "Product",
                Request::post(
                    FormData::new()
                        .with("Product", "Name", "x")
                        .with("Product", "__resolver_state", state.as_str()),
                ),
            )
            .with_instance(saved);
            let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
            assert!(interceptor.changed_parents().unwrap().is_empty(), "{flag} flagged");
            assert_eq!(interceptor.intercept("/edit/1").unwrap(), None);
        }
    }

    #[test]
    fn checking_a_false_parent_is_a_change() {
        let cfg = ResolverConfig::default();
        let state = rendered_state(Record::new(1_i64).with("Flag", false));
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = AdminContext::new(
            "Product",
            Request::post(
                FormData::new()
                    .with("Product", "Flag", "1")
                    .with("Product", "__resolver_state", state.as_str()),
            ),
        );
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
        assert_eq!(interceptor.changed_parents().unwrap(), ["Flag"]);
    }

    fn post(category: &str, state: &str) -> AdminContext {
        AdminContext::new(
            "Product",
            Request::post(
                FormData::new()
                    .with("Product", "Name", "Lamp")
                    .with("Product", "Category", category)
                    .with("Product", "__resolver_state", state),
            ),
        )
    }

    #[test]
    fn unchanged_parents_pass_through() {
        let cfg = ResolverConfig::default();
        let session = MemorySession::new();
        let bridge = DataBridge::new(&session, &cfg);
        let ctx = post("books", r#"{"Category":"books"}"#);
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
        assert!(interceptor.changed_parents().unwrap().is_empty());
        assert_eq!(interceptor.intercept("/edit/1").unwrap(), None);
        assert!(!DataBridge::new(&session, &cfg).has_data());
    }

    #[test]
    fn changed_parent_is_bridged() {
        let cfg = ResolverConfig::default();
        let session = MemorySession::new();
        let bridge = DataBridge::new(&session, &cfg);
        let ctx = post("music", r#"{"Category":"books"}"#);
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);

        assert_eq!(interceptor.changed_parents().unwrap(), ["Category"]);
        let redirect = interceptor.intercept("/edit/1").unwrap();
        assert_eq!(redirect, Some(Redirect::new("/edit/1")));

        let next = DataBridge::new(&session, &cfg);
        assert_eq!(next.get("Category", Value::Null), Value::from("music"));
        assert_eq!(next.get("Name", Value::Null), Value::from("Lamp"));
        assert!(!next.data().has("__resolver_state"));
    }

    #[test]
    fn get_requests_are_ignored() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = AdminContext::new(
            "Product",
            Request::new(
                crate::types::Method::Get,
                FormData::new().with("Product", "__resolver_state", "not json"),
            ),
        );
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
        assert!(interceptor.changed_parents().unwrap().is_empty());
    }

    #[test]
    fn malformed_state_is_an_error() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = post("books", "{broken");
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
        assert!(matches!(
            interceptor.intercept("/edit/1"),
            Err(SubmitError::State(_))
        ));
    }

    #[test]
    fn persist_failure_propagates() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = post("music", r#"{"Category":"books"}"#);
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg);
        assert!(matches!(
            interceptor.intercept("/edit/1"),
            Err(SubmitError::Persist(_))
        ));
    }

    #[test]
    fn handlers_may_replace_redirect() {
        let cfg = ResolverConfig::default();
        let session = MemorySession::new();
        let bridge = DataBridge::new(&session, &cfg);
        let ctx = post("music", r#"{"Category":"books"}"#);
        let events = Events::new().on_dependency_changed(|e| {
            e.response = Redirect::new(format!("{}#{}", e.response.location(), e.changed[0]));
        });
        let interceptor = SubmissionInterceptor::new(&bridge, &ctx, &cfg).with_events(&events);
        let redirect = interceptor.intercept("/edit/1").unwrap().unwrap();
        assert_eq!(redirect.location(), "/edit/1#Category");
    }
}
