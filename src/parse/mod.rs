mod error;
mod grammar;

use winnow::Parser;

pub use error::ParseError;

use crate::types::{FormData, Value};
use grammar::KeyPath;

/// Parse an `application/x-www-form-urlencoded` body into per-form submitted data.
///
/// `Product[Category]=books` sets `Category` in the `Product` namespace and
/// `Product[Tags][]=1` appends to a list. Keys without brackets land in
/// [`FormData::ROOT`]. Every value is a string; pairs with an empty key are
/// skipped.
///
/// # Errors
///
/// Returns [`ParseError`] on a malformed escape, invalid UTF-8, an unclosed
/// bracket, or nesting deeper than `form[field][]`.
pub fn parse_form_body(body: &str) -> Result<FormData, ParseError> {
    let pairs = grammar::raw_pairs
        .parse(body)
        .map_err(|e| ParseError::new(e.to_string()))?;

    let mut form_data = FormData::new();
    for (raw_key, raw_value) in pairs {
        let key = decode(raw_key)?;
        if key.is_empty() {
            continue;
        }
        let value = Value::String(decode(raw_value.unwrap_or_default())?);

        let path = grammar::key_path
            .parse(key.as_str())
            .map_err(|e| ParseError::new(format!("invalid key '{key}': {e}")))?;
        let (form, name, append) = match path {
            KeyPath::Root { name, append } => (FormData::ROOT, name, append),
            KeyPath::Field {
                form,
                field,
                append,
            } => (form, field, append),
        };

        let payload = form_data.namespace_mut(form);
        if append {
            payload.push(name, value);
        } else {
            payload.set(name, value);
        }
    }
    Ok(form_data)
}

fn decode(raw: &str) -> Result<String, ParseError> {
    let bytes = grammar::encoded
        .parse(raw)
        .map_err(|e| ParseError::new(e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| ParseError::new(format!("'{raw}' is not valid UTF-8")))
}
