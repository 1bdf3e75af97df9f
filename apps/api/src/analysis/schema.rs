//! Declarative shape of the model's analysis payload.
//!
//! One declaration drives three modes so they cannot drift apart:
//! - [`validate`]: strict check; strips unknown keys and fills defaulted fields.
//! - [`coerce`]: best-effort per-field rebuild from an untyped value. Its output
//!   always passes [`validate`].
//! - [`to_json_schema`]: JSON Schema sent to the model for structured output.

use std::fmt;

use serde_json::{json, Map, Number, Value};

#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Text,
    Number { min: Option<f64>, max: Option<f64> },
    /// Array whose items are all strings.
    TextList,
    /// Either a number or a string; normalized to an integer later.
    Year,
    Object(&'static ObjectShape),
    ListOf(&'static Shape),
}

#[derive(Debug)]
pub struct ObjectShape {
    pub fields: &'static [Field],
    pub undeclared: Undeclared,
}

/// What happens to keys an object does not declare.
#[derive(Debug, Clone, Copy)]
pub enum Undeclared {
    Drop,
    /// Keys whose value fits the shape are kept; the rest are dropped without complaint.
    KeepMatching(&'static Shape),
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub presence: Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be present in strict mode.
    Required,
    /// May be absent; filled with the shape's empty value.
    Defaulted,
    /// May be absent; stays absent.
    Optional,
}

// ────────────────────────────────────────────────────────────────────────────
// The analysis payload
// ────────────────────────────────────────────────────────────────────────────

const SCORE: Shape = Shape::Number {
    min: Some(0.0),
    max: Some(100.0),
};

static SCORE_SHAPE: Shape = SCORE;

const fn field(name: &'static str, shape: Shape, presence: Presence) -> Field {
    Field {
        name,
        shape,
        presence,
    }
}

pub static LOCALE_BLOCK: ObjectShape = ObjectShape {
    fields: &[
        field("summary", Shape::Text, Presence::Required),
        field("strengths", Shape::TextList, Presence::Required),
        field("weaknesses", Shape::TextList, Presence::Required),
        field("recommendations", Shape::TextList, Presence::Defaulted),
        field("skills", Shape::TextList, Presence::Required),
        field("redFlags", Shape::TextList, Presence::Defaulted),
        field("candidateName", Shape::Text, Presence::Required),
    ],
    undeclared: Undeclared::Drop,
};

pub static MULTI_LANGUAGE: ObjectShape = ObjectShape {
    fields: &[
        field("en", Shape::Object(&LOCALE_BLOCK), Presence::Required),
        field("de", Shape::Object(&LOCALE_BLOCK), Presence::Optional),
        field("fr", Shape::Object(&LOCALE_BLOCK), Presence::Optional),
    ],
    undeclared: Undeclared::Drop,
};

pub static SCORES: ObjectShape = ObjectShape {
    fields: &[
        field("technical", SCORE, Presence::Required),
        field("experience", SCORE, Presence::Required),
        field("communication", SCORE, Presence::Required),
        field("cultureFit", SCORE, Presence::Required),
    ],
    undeclared: Undeclared::KeepMatching(&SCORE_SHAPE),
};

pub static EXPERIENCE: ObjectShape = ObjectShape {
    fields: &[
        field(
            "years",
            Shape::Number {
                min: None,
                max: None,
            },
            Presence::Required,
        ),
        field("positions", Shape::TextList, Presence::Required),
        field("companies", Shape::TextList, Presence::Required),
    ],
    undeclared: Undeclared::Drop,
};

pub static EDUCATION_ENTRY: ObjectShape = ObjectShape {
    fields: &[
        field("degree", Shape::Text, Presence::Required),
        field("institution", Shape::Text, Presence::Required),
        field("year", Shape::Year, Presence::Required),
    ],
    undeclared: Undeclared::Drop,
};

static EDUCATION_ITEM: Shape = Shape::Object(&EDUCATION_ENTRY);

pub static ANALYSIS: ObjectShape = ObjectShape {
    fields: &[
        field("candidateName", Shape::Text, Presence::Required),
        field("overallScore", SCORE, Presence::Required),
        field("scores", Shape::Object(&SCORES), Presence::Required),
        field("summary", Shape::Text, Presence::Required),
        field("strengths", Shape::TextList, Presence::Required),
        field("weaknesses", Shape::TextList, Presence::Required),
        field("recommendations", Shape::TextList, Presence::Required),
        field("skills", Shape::TextList, Presence::Required),
        field("experience", Shape::Object(&EXPERIENCE), Presence::Required),
        field("education", Shape::ListOf(&EDUCATION_ITEM), Presence::Required),
        field("keyHighlights", Shape::TextList, Presence::Defaulted),
        field("redFlags", Shape::TextList, Presence::Defaulted),
        field(
            "multiLanguageData",
            Shape::Object(&MULTI_LANGUAGE),
            Presence::Optional,
        ),
    ],
    undeclared: Undeclared::Drop,
};

/// The whole model payload.
pub static ANALYSIS_PAYLOAD: Shape = Shape::Object(&ANALYSIS);

// ────────────────────────────────────────────────────────────────────────────
// Strict mode
// ────────────────────────────────────────────────────────────────────────────

/// A single strict-mode failure, addressed by JSON path (e.g. `scores.cultureFit`).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Validates `value` against `shape`, returning the cleaned value or every violation found.
pub fn validate(value: &Value, shape: &Shape) -> Result<Value, Vec<Violation>> {
    let mut violations = Vec::new();
    let cleaned = check(value, shape, "", &mut violations);
    if violations.is_empty() {
        Ok(cleaned)
    } else {
        Err(violations)
    }
}

fn check(value: &Value, shape: &Shape, path: &str, out: &mut Vec<Violation>) -> Value {
    let fail = |out: &mut Vec<Violation>, message: String| {
        out.push(Violation {
            path: path.to_string(),
            message,
        });
        Value::Null
    };

    match shape {
        Shape::Text => match value {
            Value::String(_) => value.clone(),
            other => fail(out, format!("expected string, got {}", kind(other))),
        },
        Shape::Number { min, max } => match value.as_f64() {
            Some(n) if min.is_some_and(|m| n < m) => {
                fail(out, format!("{n} is below the minimum of {}", min.unwrap_or_default()))
            }
            Some(n) if max.is_some_and(|m| n > m) => {
                fail(out, format!("{n} is above the maximum of {}", max.unwrap_or_default()))
            }
            Some(_) => value.clone(),
            None => fail(out, format!("expected number, got {}", kind(value))),
        },
        Shape::TextList => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
            Value::Array(_) => fail(out, "expected every item to be a string".to_string()),
            other => fail(out, format!("expected array, got {}", kind(other))),
        },
        Shape::Year => match value {
            Value::Number(_) | Value::String(_) => value.clone(),
            other => fail(out, format!("expected number or string, got {}", kind(other))),
        },
        Shape::ListOf(item) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| check(v, item, &format!("{path}[{i}]"), out))
                    .collect(),
            ),
            other => fail(out, format!("expected array, got {}", kind(other))),
        },
        Shape::Object(object) => match value {
            Value::Object(map) => check_object(map, object, path, out),
            other => fail(out, format!("expected object, got {}", kind(other))),
        },
    }
}

fn check_object(
    map: &Map<String, Value>,
    object: &ObjectShape,
    path: &str,
    out: &mut Vec<Violation>,
) -> Value {
    let mut cleaned = Map::new();

    for field in object.fields {
        let field_path = join(path, field.name);
        match (map.get(field.name), field.presence) {
            (Some(v), _) => {
                cleaned.insert(field.name.to_string(), check(v, &field.shape, &field_path, out));
            }
            (None, Presence::Required) => out.push(Violation {
                path: field_path,
                message: "is required".to_string(),
            }),
            (None, Presence::Defaulted) => {
                cleaned.insert(field.name.to_string(), empty_value(&field.shape));
            }
            (None, Presence::Optional) => {}
        }
    }

    if let Undeclared::KeepMatching(extra) = object.undeclared {
        for (key, v) in map {
            if is_declared(object, key) {
                continue;
            }
            let mut rejected = Vec::new();
            let kept = check(v, extra, &join(path, key), &mut rejected);
            if rejected.is_empty() {
                cleaned.insert(key.clone(), kept);
            }
        }
    }

    Value::Object(cleaned)
}

// ────────────────────────────────────────────────────────────────────────────
// Coerce mode
// ────────────────────────────────────────────────────────────────────────────

/// Rebuilds a value of `shape` from anything. `null` counts as absent.
///
/// Lists are never synthesized from scalars: a non-array (or an array holding
/// non-strings) becomes `[]` rather than a guessed one-element list.
pub fn coerce(value: Option<&Value>, shape: &Shape) -> Value {
    let value = value.filter(|v| !v.is_null());

    match shape {
        Shape::Text => Value::String(match value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }),
        Shape::Number { min, max } => {
            let n = match value {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => parse_number(s).unwrap_or(0.0),
                Some(Value::Bool(true)) => 1.0,
                _ => 0.0,
            };
            let n = match (min, max) {
                (Some(lo), _) if n < *lo => *lo,
                (_, Some(hi)) if n > *hi => *hi,
                _ => n,
            };
            match value {
                // Keep the original representation (integer vs float) when untouched.
                Some(Value::Number(orig)) if orig.as_f64() == Some(n) => Value::Number(orig.clone()),
                _ => number(n),
            }
        }
        Shape::TextList => match value {
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {
                Value::Array(items.clone())
            }
            _ => Value::Array(Vec::new()),
        },
        Shape::Year => match value {
            Some(v @ (Value::Number(_) | Value::String(_))) => v.clone(),
            _ => Value::String(String::new()),
        },
        Shape::ListOf(item) => match value {
            Some(Value::Array(items)) => {
                Value::Array(items.iter().map(|v| coerce(Some(v), item)).collect())
            }
            _ => Value::Array(Vec::new()),
        },
        Shape::Object(object) => {
            let empty = Map::new();
            let map = value.and_then(Value::as_object).unwrap_or(&empty);
            let mut rebuilt = Map::new();

            for field in object.fields {
                let source = map.get(field.name).filter(|v| !v.is_null());
                if source.is_none() && field.presence == Presence::Optional {
                    continue;
                }
                rebuilt.insert(field.name.to_string(), coerce(source, &field.shape));
            }

            if let Undeclared::KeepMatching(extra) = object.undeclared {
                for (key, v) in map {
                    if !is_declared(object, key) && admits(v, extra) {
                        rebuilt.insert(key.clone(), coerce(Some(v), extra));
                    }
                }
            }

            Value::Object(rebuilt)
        }
    }
}

/// The value a missing field takes: `""`, `0`, `[]`, or an all-empty object.
pub fn empty_value(shape: &Shape) -> Value {
    coerce(None, shape)
}

/// Parses a numeric string the way a lenient reader would: surrounding
/// whitespace ignored, empty or non-finite input rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ────────────────────────────────────────────────────────────────────────────
// JSON Schema rendering
// ────────────────────────────────────────────────────────────────────────────

pub fn to_json_schema(shape: &Shape) -> Value {
    match shape {
        Shape::Text => json!({ "type": "string" }),
        Shape::Number { min, max } => {
            let mut schema = json!({ "type": "number" });
            if let Some(min) = min {
                schema["minimum"] = json!(min);
            }
            if let Some(max) = max {
                schema["maximum"] = json!(max);
            }
            schema
        }
        Shape::TextList => json!({ "type": "array", "items": { "type": "string" } }),
        Shape::Year => json!({ "anyOf": [{ "type": "number" }, { "type": "string" }] }),
        Shape::ListOf(item) => json!({ "type": "array", "items": to_json_schema(item) }),
        Shape::Object(object) => {
            let properties: Map<String, Value> = object
                .fields
                .iter()
                .map(|f| (f.name.to_string(), to_json_schema(&f.shape)))
                .collect();
            let required: Vec<&str> = object
                .fields
                .iter()
                .filter(|f| f.presence == Presence::Required)
                .map(|f| f.name)
                .collect();
            let additional = match object.undeclared {
                Undeclared::KeepMatching(extra) => to_json_schema(extra),
                Undeclared::Drop => Value::Bool(false),
            };
            json!({
                "type": "object",
                "additionalProperties": additional,
                "properties": properties,
                "required": required,
            })
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn is_declared(object: &ObjectShape, key: &str) -> bool {
    object.fields.iter().any(|f| f.name == key)
}

/// Whether coerce mode can rebuild `value` as `shape` without inventing content.
fn admits(value: &Value, shape: &Shape) -> bool {
    match (shape, value) {
        (Shape::Text, Value::String(_)) => true,
        (Shape::Number { .. }, Value::Number(_)) => true,
        (Shape::Number { .. }, Value::String(s)) => parse_number(s).is_some(),
        (Shape::TextList, Value::Array(items)) => items.iter().all(Value::is_string),
        (Shape::Year, Value::Number(_) | Value::String(_)) => true,
        (Shape::ListOf(_), Value::Array(_)) => true,
        (Shape::Object(_), Value::Object(_)) => true,
        _ => false,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Whole numbers come out as JSON integers; everything else as floats.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or_else(|| json!(0))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
