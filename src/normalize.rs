//! Type inference for loosely typed input.
//!
//! Records, maps and sequences are turned into BSON documents without a
//! declared schema. Every scalar runs through the same cascade, first match
//! wins:
//!
//! 1. signed 64-bit integer
//! 2. 64-bit float
//! 3. RFC 3339 timestamp
//! 4. object id, when the text has the length of a quoted 24-digit hex id
//! 5. nested object, normalized recursively
//! 6. sequence, each element normalized in order
//! 7. any other JSON value as-is
//! 8. the raw bytes
//!
//! `ID`, `id` and `_id` are all stored under [`ID_FIELD`] at every level.

use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::DbError;

/// Primary-key field name used by MongoDB.
pub const ID_FIELD: &str = "_id";

const OBJECT_ID_HEX_LEN: usize = 24;

/// Output of [`normalize`]: one document for a record or map, a list of
/// values for a sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Document(Document),
    Sequence(Vec<Bson>),
}

impl Normalized {
    /// Documents ready for an insert.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` when a sequence element is not a document.
    pub fn into_documents(self) -> Result<Vec<Document>, DbError> {
        match self {
            Self::Document(d) => Ok(vec![d]),
            Self::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    Bson::Document(d) => Ok(d),
                    other => Err(DbError::InvalidInput(format!(
                        "sequence element must be a document, got {:?}",
                        other.element_type()
                    ))),
                })
                .collect(),
        }
    }
}

#[must_use]
pub fn canonical_field(key: &str) -> &str {
    match key {
        "ID" | "id" | "_id" => ID_FIELD,
        other => other,
    }
}

/// Normalizes any serializable record, map or sequence.
///
/// With `include_id == false` a top-level field resolving to `_id` is
/// dropped, leaving id assignment to the server.
///
/// # Errors
/// Returns `DbError::InvalidInput` when `input` does not serialize to a map
/// or sequence, `DbError::EmptyDocument` when nothing is left after
/// normalization (for a sequence, also when any record element is left empty), and `DbError::Json` when `input` cannot be serialized.
pub fn normalize<T: Serialize + ?Sized>(input: &T, include_id: bool) -> Result<Normalized, DbError> {
    match serde_json::to_value(input)? {
        Value::Object(map) => {
            let doc = normalize_map(map, include_id);
            if doc.is_empty() {
                return Err(DbError::EmptyDocument);
            }
            Ok(Normalized::Document(doc))
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err(DbError::EmptyDocument);
            }
            let values = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => {
                        let doc = normalize_map(map, include_id);
                        if doc.is_empty() {
                            return Err(DbError::EmptyDocument);
                        }
                        Ok(Bson::Document(doc))
                    }
                    other => Ok(infer_value(other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Normalized::Sequence(values))
        }
        other => Err(DbError::InvalidInput(format!(
            "data argument must be a struct, map or sequence, got {}",
            json_kind(&other)
        ))),
    }
}

/// Normalizes a record whose field values are still serialized text, e.g.
/// `("age", "42")` or `("tags", "[\"a\",\"b\"]")`.
///
/// # Errors
/// Returns `DbError::EmptyDocument` when no field survives.
pub fn normalize_fields<I, K, V>(fields: I, include_id: bool) -> Result<Document, DbError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = Document::new();
    for (k, v) in fields {
        let key = canonical_field(k.as_ref());
        if !include_id && key == ID_FIELD {
            continue;
        }
        out.insert(key, infer_text(v.as_ref()));
    }
    if out.is_empty() {
        return Err(DbError::EmptyDocument);
    }
    Ok(out)
}

/// Normalizes an already typed document. Typed scalars are left untouched,
/// so running this twice yields the same document.
///
/// # Errors
/// Returns `DbError::EmptyDocument` when no field survives.
pub fn normalize_document(doc: Document, include_id: bool) -> Result<Document, DbError> {
    let mut out = Document::new();
    for (k, v) in doc {
        let key = canonical_field(&k);
        if !include_id && key == ID_FIELD {
            continue;
        }
        out.insert(key, normalize_bson(v));
    }
    if out.is_empty() {
        return Err(DbError::EmptyDocument);
    }
    Ok(out)
}

/// Runs the full inference cascade over one serialized value.
#[must_use]
pub fn infer_text(text: &str) -> Bson {
    if let Ok(i) = text.parse::<i64>() {
        return Bson::Int64(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Bson::Double(f);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(v) => infer_value(v),
        Err(_) => {
            log::debug!("keeping {} unparsed bytes as binary", text.len());
            raw_bytes(text)
        }
    }
}

fn normalize_map(map: Map<String, Value>, include_id: bool) -> Document {
    let mut out = Document::new();
    for (k, v) in map {
        let key = canonical_field(&k);
        if !include_id && key == ID_FIELD {
            continue;
        }
        out.insert(key, infer_value(v));
    }
    out
}

fn infer_value(v: Value) -> Bson {
    match v {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Bson::Double(f)
            } else {
                raw_bytes(&n.to_string())
            }
        }
        Value::String(s) => infer_string(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(infer_value).collect()),
        Value::Object(map) => match extended_json_scalar(&map) {
            Some(scalar) => scalar,
            None => Bson::Document(normalize_map(map, true)),
        },
    }
}

fn infer_string(s: String) -> Bson {
    if let Ok(t) = DateTime::parse_from_rfc3339(&s) {
        return Bson::DateTime(bson::DateTime::from_millis(t.timestamp_millis()));
    }
    if s.len() == OBJECT_ID_HEX_LEN
        && let Ok(oid) = ObjectId::parse_str(&s)
    {
        return Bson::ObjectId(oid);
    }
    Bson::String(s)
}

fn normalize_bson(v: Bson) -> Bson {
    match v {
        Bson::String(s) => infer_string(s),
        Bson::Document(d) => {
            let mut out = Document::new();
            for (k, inner) in d {
                out.insert(canonical_field(&k), normalize_bson(inner));
            }
            Bson::Document(out)
        }
        Bson::Array(items) => Bson::Array(items.into_iter().map(normalize_bson).collect()),
        // typed scalars pass through
        other => other,
    }
}

// Serialized BSON types (ObjectId, DateTime, Binary, ...) arrive as
// single-key `$`-prefixed objects.
fn extended_json_scalar(map: &Map<String, Value>) -> Option<Bson> {
    let (key, _) = map.iter().next()?;
    if map.len() != 1 || !key.starts_with('$') {
        return None;
    }
    match Bson::try_from(Value::Object(map.clone())) {
        Ok(Bson::Document(_)) | Err(_) => None,
        Ok(scalar) => Some(scalar),
    }
}

fn raw_bytes(text: &str) -> Bson {
    Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes: text.as_bytes().to_vec() })
}

const fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
