//! Runtime validation of response bodies.
//!
//! A [`Validator`] inspects a decoded body, reports each violation it finds
//! to a [`ValidationContext`], and returns a conformance verdict.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Root name used in violation paths when no label is set.
pub const ROOT: &str = "$";

/// Collects violations for one validation run.
#[derive(Debug, Default)]
pub struct ValidationContext<'a> {
    label: Option<&'a str>,
    violations: Vec<String>,
}

impl<'a> ValidationContext<'a> {
    /// Create a new context; `label` replaces `$` in paths.
    pub fn new(label: Option<&'a str>) -> Self {
        Self {
            label,
            violations: Vec::new(),
        }
    }

    /// The caller's name for the value being validated.
    pub fn label(&self) -> Option<&'a str> {
        self.label
    }

    /// The label, or [`ROOT`].
    pub fn root(&self) -> &'a str {
        self.label.unwrap_or(ROOT)
    }

    /// Report one violation.
    pub fn violation(&mut self, message: impl Into<String>) {
        self.violations.push(message.into());
    }

    /// Violations reported so far.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Take the violations.
    pub fn into_violations(self) -> Vec<String> {
        self.violations
    }
}

/// Checks that a value has the shape the caller expects.
///
/// The verdict need not agree with whether violations were reported.
pub trait Validator: Send + Sync {
    fn check(&self, value: &Value, ctx: &mut ValidationContext<'_>) -> bool;
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAny;

impl Validator for AcceptAny {
    fn check(&self, _value: &Value, _ctx: &mut ValidationContext<'_>) -> bool {
        true
    }
}

/// Validator backed by a closure. Build with [`from_fn`].
#[derive(Clone)]
pub struct FnValidator<F>(F);

/// Wrap a closure as a [`Validator`].
pub fn from_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&Value, &mut ValidationContext<'_>) -> bool + Send + Sync,
{
    FnValidator(f)
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value, &mut ValidationContext<'_>) -> bool + Send + Sync,
{
    fn check(&self, value: &Value, ctx: &mut ValidationContext<'_>) -> bool {
        (self.0)(value, ctx)
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

/// Passes iff the value deserializes into `T`.
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    /// Create a new validator for `T`.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Validator for Typed<T> {
    fn check(&self, value: &Value, ctx: &mut ValidationContext<'_>) -> bool {
        match T::deserialize(value) {
            Ok(_) => true,
            Err(e) => {
                let root = ctx.root();
                ctx.violation(format!("{root}: {e}"));
                false
            }
        }
    }
}

/// Expected JSON type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Any,
    Null,
    Bool,
    Number,
    /// A number with no fractional part.
    Integer,
    String,
    Array(Box<FieldKind>),
    Object(Schema),
}

impl FieldKind {
    /// An array whose elements are `item`.
    pub fn array_of(item: FieldKind) -> Self {
        FieldKind::Array(Box::new(item))
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::Any => "any",
            FieldKind::Null => "null",
            FieldKind::Bool => "boolean",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::String => "string",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }

    fn check(&self, value: &Value, path: &str, ctx: &mut ValidationContext<'_>) -> bool {
        let matches = match (self, value) {
            (FieldKind::Any, _) => true,
            (FieldKind::Null, Value::Null) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Array(item), Value::Array(items)) => {
                let mut valid = true;
                for (index, element) in items.iter().enumerate() {
                    valid &= item.check(element, &format!("{path}[{index}]"), ctx);
                }
                return valid;
            }
            (FieldKind::Object(schema), Value::Object(_)) => {
                return schema.check_at(value, path, ctx);
            }
            _ => false,
        };

        if !matches {
            ctx.violation(format!(
                "{path}: expected {}, found {}",
                self.name(),
                json_type(value)
            ));
        }
        matches
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
}

/// Object shape: named fields with expected kinds.
///
/// Fields not listed are ignored. An optional field may be absent or null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// An object schema with no fields.
    pub fn object() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// Add a field that may be absent or null.
    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    fn check_at(&self, value: &Value, path: &str, ctx: &mut ValidationContext<'_>) -> bool {
        let Some(object) = value.as_object() else {
            ctx.violation(format!("{path}: expected object, found {}", json_type(value)));
            return false;
        };

        let mut valid = true;
        for field in &self.fields {
            let field_path = format!("{path}.{}", field.name);
            match (object.get(&field.name), field.required) {
                (None, true) => {
                    ctx.violation(format!("{field_path}: missing required field"));
                    valid = false;
                }
                (None, false) | (Some(Value::Null), false) => {}
                (Some(field_value), _) => valid &= field.kind.check(field_value, &field_path, ctx),
            }
        }
        valid
    }
}

impl Validator for Schema {
    fn check(&self, value: &Value, ctx: &mut ValidationContext<'_>) -> bool {
        let root = ctx.root();
        self.check_at(value, root, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::object()
            .field("id", FieldKind::Number)
            .field("name", FieldKind::String)
            .field("email", FieldKind::String)
    }

    fn run(validator: &dyn Validator, value: &Value, label: Option<&str>) -> (bool, Vec<String>) {
        let mut ctx = ValidationContext::new(label);
        let verdict = validator.check(value, &mut ctx);
        (verdict, ctx.into_violations())
    }

    #[test]
    fn test_schema_accepts_matching_object() {
        let body = json!({"id": 1, "name": "John Doe", "email": "j@x.com"});
        let (valid, violations) = run(&user_schema(), &body, None);
        assert!(valid);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_schema_reports_wrong_type() {
        let body = json!({"id": "1", "name": "John Doe", "email": "j@x.com"});
        let (valid, violations) = run(&user_schema(), &body, None);
        assert!(!valid);
        assert_eq!(violations, vec!["$.id: expected number, found string"]);
    }

    #[test]
    fn test_schema_uses_label_as_root() {
        let body = json!({"name": "John Doe", "email": "j@x.com"});
        let (valid, violations) = run(&user_schema(), &body, Some("User"));
        assert!(!valid);
        assert_eq!(violations, vec!["User.id: missing required field"]);
    }

    #[test]
    fn test_schema_reports_every_violation() {
        let body = json!({"id": true, "name": 3});
        let (_, violations) = run(&user_schema(), &body, None);
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_schema_optional_and_nested() {
        let schema = Schema::object()
            .field("id", FieldKind::Integer)
            .optional("nickname", FieldKind::String)
            .field(
                "tags",
                FieldKind::array_of(FieldKind::Object(Schema::object().field("label", FieldKind::String))),
            );

        let body = json!({"id": 7, "nickname": null, "tags": [{"label": "a"}, {"label": 2}]});
        let (valid, violations) = run(&schema, &body, None);
        assert!(!valid);
        assert_eq!(violations, vec!["$.tags[1].label: expected string, found number"]);
    }

    #[test]
    fn test_schema_rejects_non_object_root() {
        let (valid, violations) = run(&user_schema(), &json!([1, 2]), None);
        assert!(!valid);
        assert_eq!(violations, vec!["$: expected object, found array"]);
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let schema = Schema::object().field("n", FieldKind::Integer);
        let (valid, _) = run(&schema, &json!({"n": 1.5}), None);
        assert!(!valid);
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn test_typed_validator() {
        let validator = Typed::<User>::new();
        let (valid, violations) = run(&validator, &json!({"id": 1, "name": "a"}), None);
        assert!(valid);
        assert!(violations.is_empty());

        let (valid, violations) = run(&validator, &json!({"id": "1", "name": "a"}), Some("User"));
        assert!(!valid);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("User: "));
    }

    #[test]
    fn test_fn_validator_verdict_is_independent_of_violations() {
        let validator = from_fn(|_value, ctx| {
            ctx.violation("noted but accepted");
            true
        });
        let (valid, violations) = run(&validator, &json!(null), None);
        assert!(valid);
        assert_eq!(violations, vec!["noted but accepted"]);
    }

    #[test]
    fn test_accept_any() {
        let (valid, violations) = run(&AcceptAny, &json!("anything"), None);
        assert!(valid);
        assert!(violations.is_empty());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z]{0,4}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("id|name|email|x", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_validation_is_deterministic(value in arb_json()) {
            let schema = user_schema();
            let first = run(&schema, &value, Some("User"));
            let second = run(&schema, &value, Some("User"));
            prop_assert_eq!(first, second);
        }
    }
}
