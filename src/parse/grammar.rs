use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{take, take_while};

// -- Pairs ------------------------------------------------------------------

/// One undecoded `key=value` pair. A pair without `=` has no value.
pub(super) type RawPair<'i> = (&'i str, Option<&'i str>);

fn raw_pair<'i>(input: &mut &'i str) -> ModalResult<RawPair<'i>> {
    (
        take_while(0.., |c: char| c != '=' && c != '&'),
        opt(preceded('=', take_while(0.., |c: char| c != '&'))),
    )
        .parse_next(input)
}

pub(super) fn raw_pairs<'i>(input: &mut &'i str) -> ModalResult<Vec<RawPair<'i>>> {
    separated(0.., raw_pair, '&').parse_next(input)
}

// -- Percent decoding -------------------------------------------------------

#[derive(Clone)]
enum Chunk<'i> {
    Text(&'i str),
    Byte(u8),
}

fn escape(input: &mut &str) -> ModalResult<u8> {
    preceded(
        '%',
        cut_err(
            take(2usize)
                .verify(|hex: &str| hex.chars().all(|c| c.is_ascii_hexdigit()))
                .try_map(|hex: &str| u8::from_str_radix(hex, 16)),
        )
        .context(StrContext::Expected(StrContextValue::Description(
            "two hex digits after '%'",
        ))),
    )
    .parse_next(input)
}

fn chunk<'i>(input: &mut &'i str) -> ModalResult<Chunk<'i>> {
    alt((
        escape.map(Chunk::Byte),
        '+'.value(Chunk::Byte(b' ')),
        take_while(1.., |c: char| c != '%' && c != '+').map(Chunk::Text),
    ))
    .parse_next(input)
}

/// Percent-decoded bytes of a key or value. `+` decodes to a space.
pub(super) fn encoded(input: &mut &str) -> ModalResult<Vec<u8>> {
    repeat(0.., chunk)
        .fold(Vec::new, |mut bytes: Vec<u8>, chunk| {
            match chunk {
                Chunk::Text(text) => bytes.extend_from_slice(text.as_bytes()),
                Chunk::Byte(byte) => bytes.push(byte),
            }
            bytes
        })
        .parse_next(input)
}

// -- Keys -------------------------------------------------------------------

/// Where a decoded key puts its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum KeyPath<'i> {
    /// `name` or `name[]`, outside any form.
    Root { name: &'i str, append: bool },
    /// `form[field]` or `form[field][]`.
    Field {
        form: &'i str,
        field: &'i str,
        append: bool,
    },
}

fn name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c != '[' && c != ']')
        .context(StrContext::Expected(StrContextValue::Description("name")))
        .parse_next(input)
}

fn segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited(
        '[',
        take_while(0.., |c: char| c != '[' && c != ']'),
        cut_err(']').context(StrContext::Expected(StrContextValue::CharLiteral(']'))),
    )
    .parse_next(input)
}

fn append_marker(input: &mut &str) -> ModalResult<bool> {
    opt(segment.verify(|s: &str| s.is_empty()))
        .map(|marker| marker.is_some())
        .parse_next(input)
}

/// A decoded key. Nesting deeper than `form[field][]` is left unconsumed
/// and rejected by the caller.
pub(super) fn key_path<'i>(input: &mut &'i str) -> ModalResult<KeyPath<'i>> {
    let first = name.parse_next(input)?;
    match opt(segment).parse_next(input)? {
        None => Ok(KeyPath::Root {
            name: first,
            append: false,
        }),
        Some("") => Ok(KeyPath::Root {
            name: first,
            append: true,
        }),
        Some(field) => Ok(KeyPath::Field {
            form: first,
            field,
            append: append_marker.parse_next(input)?,
        }),
    }
}
