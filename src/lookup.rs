use tracing::trace;

use crate::bridge::DataBridge;
use crate::types::{AdminContext, Value};

/// Layered lookup of a field's current value.
///
/// Sources are checked in order, first hit wins:
///
/// 1. the redirect bridge. Once it holds any data it is authoritative and
///    lower sources are never consulted.
/// 2. the live submission under the context's form name, ignoring `Null`.
/// 3. the entity bound to the admin context.
///
/// Every miss or failure falls back to the caller's default.
#[derive(Debug, Clone, Copy)]
pub struct ValueLookup<'r> {
    bridge: &'r DataBridge<'r>,
    context: Option<&'r AdminContext>,
}

impl<'r> ValueLookup<'r> {
    pub fn new(bridge: &'r DataBridge<'r>, context: Option<&'r AdminContext>) -> Self {
        Self { bridge, context }
    }

    #[must_use]
    pub fn get_value(&self, name: &str, default: Value) -> Value {
        if self.bridge.has_data() {
            trace!(field = name, "value from bridge");
            return self.bridge.get(name, default);
        }

        let Some(context) = self.context else {
            return default;
        };

        let submitted = context
            .request()
            .submitted(context.entity_name())
            .and_then(|payload| payload.get(name))
            .filter(|value| !value.is_null());
        if let Some(value) = submitted {
            trace!(field = name, "value from submission");
            return value.clone();
        }

        let Some(entity) = context.instance() else {
            return default;
        };
        match entity.property(name) {
            Ok(Value::Null) => default,
            Ok(value) => {
                trace!(field = name, "value from entity");
                value
            }
            Err(err) => {
                trace!(field = name, error = %err, "entity property unreadable");
                default
            }
        }
    }

    #[must_use]
    pub fn context(&self) -> Option<&'r AdminContext> {
        self.context
    }

    #[must_use]
    pub fn bridge(&self) -> &'r DataBridge<'r> {
        self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MemorySession, NoSession, Session};
    use crate::config::ResolverConfig;
    use crate::types::{FormData, Payload, Record, Request};

    fn context(form: FormData) -> AdminContext {
        AdminContext::new("Product", Request::post(form)).with_instance(
            Record::new(1_i64)
                .with("a", 4_i64)
                .with("b", 5_i64)
                .with("c", 6_i64)
                .with("empty", Value::Null),
        )
    }

    fn live() -> FormData {
        FormData::new()
            .with("Product", "a", 2_i64)
            .with("Product", "b", 3_i64)
    }

    #[test]
    fn bridge_short_circuits_lower_sources() {
        let cfg = ResolverConfig::default();
        let session = MemorySession::new();
        session
            .set(&cfg.session_key, Payload::new().with("a", 1_i64))
            .unwrap();
        let bridge = DataBridge::new(&session, &cfg);
        let ctx = context(live());
        let lookup = ValueLookup::new(&bridge, Some(&ctx));

        assert_eq!(lookup.get_value("a", Value::Null), Value::Int(1));
        assert_eq!(lookup.get_value("b", Value::from("d")), Value::from("d"));
        assert_eq!(lookup.get_value("c", Value::Null), Value::Null);
    }

    #[test]
    fn submission_then_entity() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = context(live());
        let lookup = ValueLookup::new(&bridge, Some(&ctx));

        assert_eq!(lookup.get_value("a", Value::Null), Value::Int(2));
        assert_eq!(lookup.get_value("b", Value::Null), Value::Int(3));
        assert_eq!(lookup.get_value("c", Value::Null), Value::Int(6));
        assert_eq!(lookup.get_value("zzz", Value::from("d")), Value::from("d"));
        assert_eq!(lookup.get_value("empty", Value::from("d")), Value::from("d"));
    }

    #[test]
    fn null_submission_falls_through() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = context(FormData::new().with("Product", "a", Value::Null));
        let lookup = ValueLookup::new(&bridge, Some(&ctx));
        assert_eq!(lookup.get_value("a", Value::Null), Value::Int(4));
    }

    #[test]
    fn other_form_namespace_is_ignored() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = context(FormData::new().with("Order", "a", 99_i64));
        let lookup = ValueLookup::new(&bridge, Some(&ctx));
        assert_eq!(lookup.get_value("a", Value::Null), Value::Int(4));
    }

    #[test]
    fn no_context_returns_default() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let lookup = ValueLookup::new(&bridge, None);
        assert_eq!(lookup.get_value("a", Value::from("d")), Value::from("d"));
    }

    #[test]
    fn no_instance_returns_default() {
        let cfg = ResolverConfig::default();
        let bridge = DataBridge::new(&NoSession, &cfg);
        let ctx = AdminContext::new("Product", Request::get());
        let lookup = ValueLookup::new(&bridge, Some(&ctx));
        assert_eq!(lookup.get_value("a", Value::Int(0)), Value::Int(0));
    }
}
