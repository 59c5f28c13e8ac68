use serde::Deserialize;

/// Session key the redirect bridge stores submissions under.
pub const DEFAULT_SESSION_KEY: &str = "dependent_fields.bridge";

/// Name of the hidden field carrying the encoded [`StateSnapshot`](crate::StateSnapshot).
pub const DEFAULT_STATE_FIELD: &str = "__resolver_state";

/// Host-tunable names used by the resolver, bridge, and submission interceptor.
///
/// Deserializable from any serde format; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub session_key: String,
    pub state_field: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.to_owned(),
            state_field: DEFAULT_STATE_FIELD.to_owned(),
        }
    }
}
