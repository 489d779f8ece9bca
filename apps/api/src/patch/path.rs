//! Dotted field-path addressing into a profile document.
//!
//! `workExperiences.0.description` parses to `[Key("workExperiences"), Index(0), Key("description")]`.
//! All-digit segments are array indices; everything else is an object key.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Largest array index a write may use. Writes pad arrays with `null` up to
/// the index, so this bounds how far a single write can grow an array.
/// Numeric segments that land on objects are plain keys and are not limited.
pub const MAX_ARRAY_INDEX: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Malformed field path '{0}'")]
    Malformed(String),

    #[error("Cannot address '{path}': segment '{segment}' runs into a {found} value")]
    NotAContainer {
        path: String,
        segment: String,
        found: &'static str,
    },

    #[error("Cannot address '{path}': segment '{segment}' is a key but the value there is an array")]
    KeyIntoArray { path: String, segment: String },

    #[error("Cannot address '{path}': index {index} exceeds the limit of {MAX_ARRAY_INDEX}")]
    IndexOutOfRange { path: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }

    /// Empty container to create when this segment has to be walked through.
    fn empty_container(&self) -> Value {
        match self {
            Segment::Key(_) => Value::Object(Map::new()),
            Segment::Index(_) => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        if raw.is_empty() {
            return Err(AddressError::Malformed(raw.to_string()));
        }

        let segments = raw
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(AddressError::Malformed(raw.to_string()))
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse::<usize>()
                        .map(Segment::Index)
                        .map_err(|_| AddressError::Malformed(raw.to_string()))
                } else {
                    Ok(Segment::Key(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Final segment as text, e.g. `technologies` for `projects.2.technologies`.
    pub fn leaf_name(&self) -> String {
        self.segments
            .last()
            .map(Segment::as_key)
            .unwrap_or_default()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), seg) => map.get(&seg.as_key()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    }
}

/// Returns the value at `path`, or `None` if any segment is missing.
pub fn read<'a>(doc: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments
        .iter()
        .try_fold(doc, |node, segment| step(node, segment))
}

/// Resolves the child slot for `segment` inside `node`, inserting `null` if absent.
fn child_slot<'a>(
    node: &'a mut Value,
    segment: &Segment,
    path: &FieldPath,
) -> Result<&'a mut Value, AddressError> {
    match node {
        Value::Object(map) => Ok(map.entry(segment.as_key()).or_insert(Value::Null)),
        Value::Array(items) => match segment {
            Segment::Index(i) => {
                index_in_range(*i, path)?;
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                Ok(&mut items[*i])
            }
            Segment::Key(k) => Err(AddressError::KeyIntoArray {
                path: path.raw.clone(),
                segment: k.clone(),
            }),
        },
        other => Err(AddressError::NotAContainer {
            path: path.raw.clone(),
            segment: segment.to_string(),
            found: kind_name(other),
        }),
    }
}

fn index_in_range(index: usize, path: &FieldPath) -> Result<(), AddressError> {
    if index > MAX_ARRAY_INDEX {
        return Err(AddressError::IndexOutOfRange {
            path: path.raw.clone(),
            index,
        });
    }
    Ok(())
}

/// Checks that [`write`] would succeed at `path` without touching the document.
pub fn check_write(doc: &Value, path: &FieldPath) -> Result<(), AddressError> {
    let mut node = Some(doc);

    for (depth, segment) in path.segments.iter().enumerate() {
        node = match node {
            // Missing or null intermediates become the container this segment needs.
            None | Some(Value::Null) if depth > 0 => {
                if let Segment::Index(i) = segment {
                    index_in_range(*i, path)?;
                }
                None
            }
            Some(Value::Object(map)) => map.get(&segment.as_key()),
            Some(Value::Array(items)) => match segment {
                Segment::Index(i) => {
                    index_in_range(*i, path)?;
                    items.get(*i)
                }
                Segment::Key(k) => {
                    return Err(AddressError::KeyIntoArray {
                        path: path.raw.clone(),
                        segment: k.clone(),
                    })
                }
            },
            other => {
                return Err(AddressError::NotAContainer {
                    path: path.raw.clone(),
                    segment: segment.to_string(),
                    found: other.map(kind_name).unwrap_or("missing"),
                })
            }
        };
    }

    Ok(())
}

/// Writes `value` at `path`, creating intermediate objects/arrays on the way.
///
/// Missing and `null` intermediates are replaced by the container the next
/// segment needs. Walking through a scalar fails; nothing is coerced.
/// The path is checked up front, so a failed write leaves `doc` untouched.
pub fn write(doc: &mut Value, path: &FieldPath, value: Value) -> Result<(), AddressError> {
    check_write(doc, path)?;

    let mut node = doc;
    let segments = &path.segments;

    for (i, segment) in segments.iter().enumerate() {
        let slot = child_slot(node, segment, path)?;
        match segments.get(i + 1) {
            None => {
                *slot = value;
                return Ok(());
            }
            Some(next) => {
                if slot.is_null() {
                    *slot = next.empty_container();
                }
                node = slot;
            }
        }
    }

    Ok(())
}

/// Removes the value at `path` and returns it.
///
/// Object keys are deleted. Array slots are reset to `null` so the indices of
/// siblings (and any other suggestion addressing them) stay valid.
/// A path that does not exist is not an error.
pub fn remove(doc: &mut Value, path: &FieldPath) -> Result<Option<Value>, AddressError> {
    let Some((last, parents)) = path.segments.split_last() else {
        return Ok(None);
    };

    let mut node = doc;
    for segment in parents {
        node = match node {
            Value::Object(map) => match map.get_mut(&segment.as_key()) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(items) => match segment {
                Segment::Index(i) => match items.get_mut(*i) {
                    Some(child) => child,
                    None => return Ok(None),
                },
                Segment::Key(k) => {
                    return Err(AddressError::KeyIntoArray {
                        path: path.raw.clone(),
                        segment: k.clone(),
                    })
                }
            },
            Value::Null => return Ok(None),
            other => {
                return Err(AddressError::NotAContainer {
                    path: path.raw.clone(),
                    segment: segment.to_string(),
                    found: kind_name(other),
                })
            }
        };
    }

    match (node, last) {
        (Value::Object(map), seg) => Ok(map.remove(&seg.as_key())),
        (Value::Array(items), Segment::Index(i)) => {
            Ok(items.get_mut(*i).map(|slot| slot.take()))
        }
        (Value::Array(_), Segment::Key(k)) => Err(AddressError::KeyIntoArray {
            path: path.raw.clone(),
            segment: k.clone(),
        }),
        (Value::Null, _) => Ok(None),
        (other, seg) => Err(AddressError::NotAContainer {
            path: path.raw.clone(),
            segment: seg.to_string(),
            found: kind_name(other),
        }),
    }
}
