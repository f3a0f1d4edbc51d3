//! Normalizer - Raw transfer objects to typed entities
//!
//! `TigerStyle`: Validate first, then copy. A payload either parses completely
//! or is rejected; nothing half-parsed reaches a registry.
//!
//! Field names on the wire are PascalCase (`ID`, `ParentID`, `OrderIndex`,
//! `Title`, `Created`, `LastModified`, `Children`, `ChildrenIDs`). Fields the
//! core does not model are kept verbatim in `Entity::fields`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use super::error::{ParseError, ParseResult};
use super::kind::EntityKind;
use super::model::Entity;
use crate::constants::{ENTITY_ID_BYTES_MAX, ENTITY_TITLE_BYTES_MAX};

/// A raw transfer object as received from the remote source.
pub type RawObject = Map<String, Value>;

/// Output of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The entity with base fields copied and derived fields recomputed
    pub entity: Entity,
    /// Raw nested children (each with `ParentID` filled in), to be upserted
    /// by the caller
    pub nested: Vec<Value>,
}

/// Normalize a raw payload, copying its fields onto `existing` when given.
///
/// Fields absent from `raw` keep the values of `existing`; derived fields
/// (`ansi_title`, `route_uri`, and `children_ids` when the payload nests
/// children) are recomputed afterwards.
///
/// # Errors
/// Returns a `ParseError` when the payload is not an object, has no `ID`,
/// carries a field of the wrong shape, or names a different identity than
/// `existing`.
pub fn normalize(kind: EntityKind, raw: &Value, existing: Option<&Entity>) -> ParseResult<Normalized> {
    let object = raw.as_object().ok_or(ParseError::NotAnObject)?;
    let id = parse_id(object)?;

    let mut entity = match existing {
        Some(current) if current.id != id => {
            return Err(ParseError::IdMismatch {
                expected: current.id.clone(),
                found: id,
            });
        }
        Some(current) => current.clone(),
        None => Entity::new(kind, id.as_str(), ""),
    };

    let has_title = object.contains_key("Title");
    let mut children_ids = None;
    let mut nested = Vec::new();

    for (key, value) in object {
        match key.as_str() {
            "ID" | "ansiTitle" | "ANSITitle" => {}
            "ParentID" => entity.parent_id = parse_optional_string(key, value)?,
            "OrderIndex" => entity.order_index = parse_optional_int(key, value)?,
            "Title" => {
                if let Some(title) = parse_title(key, value)? {
                    entity.title = title;
                }
            }
            "Created" => entity.created = parse_optional_time(key, value)?,
            "LastModified" => entity.last_modified = parse_optional_time(key, value)?,
            "ChildrenIDs" => {
                if children_ids.is_none() {
                    children_ids = Some(parse_children_ids(value)?);
                }
            }
            "Children" => {
                if let Some((ids, raws)) = parse_children(&id, value)? {
                    children_ids = Some(Some(ids));
                    nested = raws;
                }
            }
            _ => {
                if key == "Name" && !has_title {
                    if let Some(title) = parse_title(key, value)? {
                        entity.title = title;
                    }
                }
                entity.fields.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some(ids) = children_ids {
        entity.children_ids = ids;
    }
    entity.refresh_derived();

    Ok(Normalized { entity, nested })
}

fn parse_id(object: &RawObject) -> ParseResult<String> {
    match object.get("ID") {
        None | Some(Value::Null) => Err(ParseError::MissingId),
        Some(Value::String(id)) => {
            let id = id.trim();
            if id.is_empty() {
                Err(ParseError::MissingId)
            } else if id.len() > ENTITY_ID_BYTES_MAX {
                Err(ParseError::invalid_field(
                    "ID",
                    format!("{} bytes exceeds max {ENTITY_ID_BYTES_MAX}", id.len()),
                ))
            } else {
                Ok(id.to_string())
            }
        }
        Some(_) => Err(ParseError::invalid_field("ID", "expected a string")),
    }
}

fn parse_optional_string(field: &str, value: &Value) -> ParseResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        _ => Err(ParseError::invalid_field(field, "expected a string")),
    }
}

fn parse_title(field: &str, value: &Value) -> ParseResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.len() > ENTITY_TITLE_BYTES_MAX => Err(ParseError::invalid_field(
            field,
            format!("{} bytes exceeds max {ENTITY_TITLE_BYTES_MAX}", s.len()),
        )),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(ParseError::invalid_field(field, "expected a string")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_optional_int(field: &str, value: &Value) -> ParseResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| ParseError::invalid_field(field, "number out of range")),
        _ => Err(ParseError::invalid_field(field, "expected a number")),
    }
}

fn parse_optional_time(field: &str, value: &Value) -> ParseResult<Option<DateTime<Utc>>> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.trim(),
        _ => return Err(ParseError::invalid_field(field, "expected a timestamp string")),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|err| ParseError::invalid_field(field, err.to_string()))
}

fn parse_children_ids(value: &Value) -> ParseResult<Option<Vec<String>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
                _ => Err(ParseError::invalid_field(
                    "ChildrenIDs",
                    "expected non-empty strings",
                )),
            })
            .collect::<ParseResult<Vec<_>>>()
            .map(Some),
        _ => Err(ParseError::invalid_field("ChildrenIDs", "expected an array")),
    }
}

fn parse_children(parent_id: &str, value: &Value) -> ParseResult<Option<(Vec<String>, Vec<Value>)>> {
    let items = match value {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        _ => return Err(ParseError::invalid_field("Children", "expected an array")),
    };

    let mut ids = Vec::with_capacity(items.len());
    let mut raws = Vec::with_capacity(items.len());
    for item in items {
        let mut child = item
            .as_object()
            .cloned()
            .ok_or_else(|| ParseError::invalid_field("Children", "expected objects"))?;
        let child_id = parse_id(&child)
            .map_err(|err| ParseError::invalid_field("Children", err.to_string()))?;

        let has_parent = child
            .get("ParentID")
            .and_then(Value::as_str)
            .is_some_and(|p| !p.trim().is_empty());
        if !has_parent {
            child.insert("ParentID".to_string(), Value::String(parent_id.to_string()));
        }

        ids.push(child_id);
        raws.push(Value::Object(child));
    }

    Ok(Some((ids, raws)))
}

// =============================================================================
// ANSI normalization
// =============================================================================

/// Diacritic folds, checked after lower-casing.
const FOLDS: &[(&str, &str)] = &[
    ("àáảãạăằắẳẵặâầấẩẫậäåāąǎ", "a"),
    ("çćĉċč", "c"),
    ("đďð", "d"),
    ("èéẻẽẹêềếểễệëēĕėęě", "e"),
    ("ĝğġģ", "g"),
    ("ĥħ", "h"),
    ("ìíỉĩịîïīĭįı", "i"),
    ("ĵ", "j"),
    ("ķ", "k"),
    ("ĺļľŀł", "l"),
    ("ñńņňŉ", "n"),
    ("òóỏõọôồốổỗộơờớởỡợöøōŏő", "o"),
    ("ŕŗř", "r"),
    ("śŝşš", "s"),
    ("ţťŧ", "t"),
    ("ùúủũụưừứửữựûüūŭůűų", "u"),
    ("ŵ", "w"),
    ("ỳýỷỹỵÿŷ", "y"),
    ("źżž", "z"),
    ("ß", "ss"),
    ("æ", "ae"),
    ("œ", "oe"),
    ("þ", "th"),
];

/// Combining diacritical mark blocks, dropped so decomposed input folds
/// like precomposed input.
const COMBINING_MARKS: [(char, char); 5] = [
    ('\u{0300}', '\u{036F}'),
    ('\u{1AB0}', '\u{1AFF}'),
    ('\u{1DC0}', '\u{1DFF}'),
    ('\u{20D0}', '\u{20FF}'),
    ('\u{FE20}', '\u{FE2F}'),
];

fn is_combining_mark(c: char) -> bool {
    COMBINING_MARKS.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c))
}

fn fold(c: char, out: &mut String) {
    if c.is_ascii() {
        out.push(c);
        return;
    }
    if is_combining_mark(c) {
        return;
    }
    match FOLDS.iter().find(|(from, _)| from.contains(c)) {
        Some((_, to)) => out.push_str(to),
        None => out.push(c),
    }
}

/// Lower-case `text`, strip diacritics and collapse whitespace.
///
/// ```
/// use portals_cache::entity::ansi;
/// assert_eq!(ansi("  Tin  Tức Mới "), "tin tuc moi");
/// assert_eq!(ansi("Cat A"), "cat a");
/// ```
#[must_use]
pub fn ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            fold(c, &mut out);
        }
    }
    out
}

/// URL slug of an already ANSI-normalized title.
#[must_use]
pub fn slug(ansi_title: &str) -> String {
    let mut out = String::with_capacity(ansi_title.len());
    let mut dash = false;
    for c in ansi_title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
