//! Composable schema values and their validator.
//!
//! # Design
//! A [`Schema`] is a tagged description of an accepted JSON shape. Schemas
//! are immutable and shared through [`SchemaRef`] (`Arc<Schema>`), so one
//! `Guild` schema can back both the list and the get-by-id endpoints.
//!
//! [`Schema::validate`] is pure and total: it walks the input once, collects
//! every violation with a field path (`channels[0].type`), and only returns
//! the normalized value when the list is empty. Normalization means two
//! things: field defaults are substituted for absent keys, and passthrough
//! objects keep undeclared keys verbatim while strict objects reject them.
//!
//! Unions and intersections keep their branches in a `Vec`; the first
//! matching union branch wins, so declaration order is the tie-break.

use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

/// Shared handle to an immutable schema.
pub type SchemaRef = Arc<Schema>;

/// An abstract description of an allowed data shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Schema {
    String(StringRules),
    Number(NumberRules),
    Boolean,
    /// Exactly this JSON value (e.g. `0` or `1` for SQLite booleans).
    Literal { value: Value },
    /// One of a closed, case-sensitive set of strings.
    Enum { values: Vec<String> },
    Array { items: SchemaRef },
    Object(ObjectSchema),
    /// First branch that validates wins.
    Union { branches: Vec<SchemaRef> },
    /// Every part must validate; object outputs are merged in order.
    Intersection { parts: Vec<SchemaRef> },
    /// Present, but possibly `null`.
    Nullable { inner: SchemaRef },
    /// No payload at all. Empty HTTP bodies decode to `null`.
    Void,
    Any,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StringFormat {
    /// RFC 3339 timestamp that must carry `Z` or a `±HH:MM` offset.
    #[serde(rename = "date-time")]
    DateTimeOffset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberRules {
    pub integer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
}

/// How an object treats keys it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownKeys {
    /// Undeclared keys are an `UnknownField` violation.
    Strict,
    /// Undeclared keys are copied into the output unchanged.
    Passthrough,
}

/// Whether a field may be absent, and what replaces it when it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Presence {
    Required,
    Optional,
    Default(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub schema: SchemaRef,
    pub presence: Presence,
}

/// Ordered field set plus the unknown-key policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<Field>,
    pub unknown_keys: UnknownKeys,
}

impl ObjectSchema {
    pub fn strict() -> Self {
        Self::with_policy(UnknownKeys::Strict)
    }

    pub fn passthrough() -> Self {
        Self::with_policy(UnknownKeys::Passthrough)
    }

    fn with_policy(unknown_keys: UnknownKeys) -> Self {
        Self {
            name: None,
            fields: Vec::new(),
            unknown_keys,
        }
    }

    /// Name shown in exported contracts.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field(self, name: impl Into<String>, schema: impl Into<SchemaRef>) -> Self {
        self.push(name, schema, Presence::Required)
    }

    pub fn optional_field(self, name: impl Into<String>, schema: impl Into<SchemaRef>) -> Self {
        self.push(name, schema, Presence::Optional)
    }

    /// A field that is substituted with `default` when absent.
    pub fn default_field(
        self,
        name: impl Into<String>,
        schema: impl Into<SchemaRef>,
        default: Value,
    ) -> Self {
        self.push(name, schema, Presence::Default(default))
    }

    /// Makes every field optional, keeping explicit defaults.
    pub fn partial(mut self) -> Self {
        for field in &mut self.fields {
            if field.presence == Presence::Required {
                field.presence = Presence::Optional;
            }
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema::Object(self)
    }

    fn push(mut self, name: impl Into<String>, schema: impl Into<SchemaRef>, presence: Presence) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema: schema.into(),
            presence,
        });
        self
    }

    fn declares(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.name == key)
    }
}

impl Schema {
    pub fn string() -> Self {
        Schema::String(StringRules::default())
    }

    /// String with at least `min` characters.
    pub fn string_min(min: usize) -> Self {
        Schema::String(StringRules {
            min_len: Some(min),
            format: None,
        })
    }

    pub fn datetime_offset() -> Self {
        Schema::String(StringRules {
            min_len: None,
            format: Some(StringFormat::DateTimeOffset),
        })
    }

    pub fn number() -> Self {
        Schema::Number(NumberRules::default())
    }

    pub fn integer() -> Self {
        Schema::Number(NumberRules {
            integer: true,
            gte: None,
        })
    }

    pub fn number_gte(min: f64) -> Self {
        Schema::Number(NumberRules {
            integer: false,
            gte: Some(min),
        })
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal {
            value: value.into(),
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn array(items: impl Into<SchemaRef>) -> Self {
        Schema::Array {
            items: items.into(),
        }
    }

    pub fn union<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemaRef>,
    {
        Schema::Union {
            branches: branches.into_iter().map(Into::into).collect(),
        }
    }

    pub fn intersection<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SchemaRef>,
    {
        Schema::Intersection {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn void() -> Self {
        Schema::Void
    }

    pub fn any() -> Self {
        Schema::Any
    }

    /// Wraps `self` so that an explicit `null` is also accepted.
    pub fn nullable(self) -> Self {
        Schema::Nullable {
            inner: Arc::new(self),
        }
    }

    pub fn shared(self) -> SchemaRef {
        Arc::new(self)
    }

    /// Validates `raw`, returning the normalized value or every violation found.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        let mut violations = Vec::new();
        let value = self.check(raw, &FieldPath::root(), &mut violations);
        if violations.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError { violations })
        }
    }

    fn check(&self, raw: &Value, path: &FieldPath, out: &mut Vec<Violation>) -> Value {
        match self {
            Schema::String(rules) => check_string(rules, raw, path, out),
            Schema::Number(rules) => check_number(rules, raw, path, out),
            Schema::Boolean => {
                if !raw.is_boolean() {
                    out.push(Violation::mismatch(path, "boolean", raw));
                }
                raw.clone()
            }
            Schema::Literal { value } => {
                if raw != value {
                    out.push(Violation::new(
                        path,
                        ViolationKind::LiteralMismatch {
                            expected: value.clone(),
                            found: raw.clone(),
                        },
                    ));
                }
                raw.clone()
            }
            Schema::Enum { values } => {
                match raw.as_str() {
                    None => out.push(Violation::mismatch(path, "string", raw)),
                    Some(s) if values.iter().any(|v| v == s) => {}
                    Some(s) => out.push(Violation::new(
                        path,
                        ViolationKind::InvalidEnumValue {
                            value: s.to_string(),
                            allowed: values.clone(),
                        },
                    )),
                }
                raw.clone()
            }
            Schema::Array { items } => match raw.as_array() {
                Some(elements) => Value::Array(
                    elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| items.check(element, &path.index(i), out))
                        .collect(),
                ),
                None => {
                    out.push(Violation::mismatch(path, "array", raw));
                    raw.clone()
                }
            },
            Schema::Object(object) => check_object(object, raw, path, out),
            Schema::Union { branches } => {
                let mut rejected = Vec::with_capacity(branches.len());
                for branch in branches {
                    let mut branch_violations = Vec::new();
                    let value = branch.check(raw, path, &mut branch_violations);
                    if branch_violations.is_empty() {
                        return value;
                    }
                    rejected.push(branch_violations);
                }
                out.push(Violation::new(
                    path,
                    ViolationKind::NoMatchingBranch { branches: rejected },
                ));
                raw.clone()
            }
            Schema::Intersection { parts } => {
                let mut merged: Option<Value> = None;
                for part in parts {
                    let value = part.check(raw, path, out);
                    merged = Some(match (merged, value) {
                        (Some(Value::Object(mut acc)), Value::Object(next)) => {
                            acc.extend(next);
                            Value::Object(acc)
                        }
                        (_, next) => next,
                    });
                }
                merged.unwrap_or_else(|| raw.clone())
            }
            Schema::Nullable { inner } => {
                if raw.is_null() {
                    Value::Null
                } else {
                    inner.check(raw, path, out)
                }
            }
            Schema::Void => {
                if !raw.is_null() {
                    out.push(Violation::mismatch(path, "no body", raw));
                }
                Value::Null
            }
            Schema::Any => raw.clone(),
        }
    }
}

fn check_string(rules: &StringRules, raw: &Value, path: &FieldPath, out: &mut Vec<Violation>) -> Value {
    let Some(s) = raw.as_str() else {
        out.push(Violation::mismatch(path, "string", raw));
        return raw.clone();
    };
    if let Some(min) = rules.min_len {
        let actual = s.chars().count();
        if actual < min {
            out.push(Violation::new(path, ViolationKind::TooShort { min, actual }));
        }
    }
    if rules.format == Some(StringFormat::DateTimeOffset) && !is_offset_datetime(s) {
        out.push(Violation::new(
            path,
            ViolationKind::InvalidDateTime {
                value: s.to_string(),
            },
        ));
    }
    raw.clone()
}

/// `YYYY-MM-DDTHH:MM:SS[.fff]` followed by `Z` or `±HH:MM`.
///
/// chrono alone also takes a space or lower-case `t` separator and a
/// lower-case `z`, so the shape is checked before parsing.
fn is_offset_datetime(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.get(10) != Some(&b'T') {
        return false;
    }
    let n = bytes.len();
    let offset_ok = s.ends_with('Z')
        || (n >= 6
            && matches!(bytes[n - 6], b'+' | b'-')
            && bytes[n - 3] == b':'
            && [n - 5, n - 4, n - 2, n - 1].iter().all(|&i| bytes[i].is_ascii_digit()));
    offset_ok && DateTime::parse_from_rfc3339(s).is_ok()
}

fn check_number(rules: &NumberRules, raw: &Value, path: &FieldPath, out: &mut Vec<Violation>) -> Value {
    let Some(n) = raw.as_f64() else {
        out.push(Violation::mismatch(path, "number", raw));
        return raw.clone();
    };
    if rules.integer && !(raw.is_i64() || raw.is_u64() || n.fract() == 0.0) {
        out.push(Violation::new(path, ViolationKind::NotAnInteger { value: n }));
    }
    if let Some(min) = rules.gte {
        if n < min {
            out.push(Violation::new(path, ViolationKind::RangeViolation { min, actual: n }));
        }
    }
    raw.clone()
}

fn check_object(object: &ObjectSchema, raw: &Value, path: &FieldPath, out: &mut Vec<Violation>) -> Value {
    let Some(input) = raw.as_object() else {
        out.push(Violation::mismatch(path, "object", raw));
        return raw.clone();
    };

    let mut result = Map::new();
    for field in &object.fields {
        let field_path = path.key(&field.name);
        match (input.get(&field.name), &field.presence) {
            (Some(value), _) => {
                let checked = field.schema.check(value, &field_path, out);
                result.insert(field.name.clone(), checked);
            }
            (None, Presence::Required) => {
                out.push(Violation::new(&field_path, ViolationKind::MissingField));
            }
            (None, Presence::Optional) => {}
            (None, Presence::Default(default)) => {
                result.insert(field.name.clone(), default.clone());
            }
        }
    }

    for (key, value) in input {
        if object.declares(key) {
            continue;
        }
        match object.unknown_keys {
            UnknownKeys::Strict => out.push(Violation::new(&path.key(key), ViolationKind::UnknownField)),
            UnknownKeys::Passthrough => {
                result.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(result)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Field paths and violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a nested document, rendered as
/// `settings.nickname` or `channels[2].type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    UnknownField,
    MissingField,
    TypeMismatch { expected: &'static str, found: &'static str },
    InvalidEnumValue { value: String, allowed: Vec<String> },
    LiteralMismatch { expected: Value, found: Value },
    RangeViolation { min: f64, actual: f64 },
    NotAnInteger { value: f64 },
    TooShort { min: usize, actual: usize },
    InvalidDateTime { value: String },
    /// Every union branch failed; one violation list per branch, in order.
    NoMatchingBranch { branches: Vec<Vec<Violation>> },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::UnknownField => f.write_str("unknown field"),
            ViolationKind::MissingField => f.write_str("missing required field"),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ViolationKind::InvalidEnumValue { value, allowed } => {
                write!(f, "{value:?} is not one of [{}]", allowed.join(", "))
            }
            ViolationKind::LiteralMismatch { expected, found } => {
                write!(f, "expected literal {expected}, found {found}")
            }
            ViolationKind::RangeViolation { min, actual } => {
                write!(f, "{actual} is less than the minimum {min}")
            }
            ViolationKind::NotAnInteger { value } => write!(f, "{value} is not an integer"),
            ViolationKind::TooShort { min, actual } => {
                write!(f, "length {actual} is shorter than {min}")
            }
            ViolationKind::InvalidDateTime { value } => {
                write!(f, "{value:?} is not a date-time with a UTC offset")
            }
            ViolationKind::NoMatchingBranch { branches } => {
                write!(f, "no union branch matched ({} tried)", branches.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

impl Violation {
    fn new(path: &FieldPath, kind: ViolationKind) -> Self {
        Self {
            path: path.clone(),
            kind,
        }
    }

    fn mismatch(path: &FieldPath, expected: &'static str, found: &Value) -> Self {
        Self::new(
            path,
            ViolationKind::TypeMismatch {
                expected,
                found: kind_of(found),
            },
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

/// A non-empty list of violations produced by [`Schema::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", render(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True if any violation sits at `path` (as rendered) with a matching kind.
    pub fn has(&self, path: &str, matches: impl Fn(&ViolationKind) -> bool) -> bool {
        self.violations
            .iter()
            .any(|v| v.path.to_string() == path && matches(&v.kind))
    }
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
