//! JSON-schema subset validation.
//!
//! Supplementary metadata declares a schema fragment per parameter (and per
//! return value). Fragments may reference shared component schemas with
//! `{"$ref": "#/components/schemas/<Name>"}`. A [`Schema`] is compiled once
//! per check, which rejects malformed keywords, dangling references and
//! reference loops that never descend into the instance, and
//! then validates a JSON instance into a list of [`Violation`]s.
//!
//! Supported keywords: `type`, `enum`, `const`, `properties`, `required`,
//! `additionalProperties`, `items`, `minItems`, `maxItems`, `minimum`,
//! `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `minLength`,
//! `maxLength`, `allOf`, `anyOf`, `oneOf`, `not`, `$ref`. Anything else
//! (`format`, `$id`, `description`, ...) is accepted and ignored.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value as Json};

use super::ComponentMetadata;

/// Prefix of same-document component references
pub const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

const TYPES: [&str; 7] = [
    "null", "boolean", "object", "array", "number", "string", "integer",
];

/// The schema document itself is unusable
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// `$ref` target is not a known component
    #[error("unresolvable reference {0}")]
    UnresolvedRef(String),

    /// A keyword holds the wrong kind of value
    #[error("keyword {keyword} must be {expected}")]
    Malformed {
        /// Keyword name
        keyword: String,
        /// What it should hold
        expected: &'static str,
    },

    /// `type` names something outside the JSON type set
    #[error("unknown type {0}")]
    UnknownType(String),

    /// A `$ref` loop that reaches itself without descending into the instance
    #[error("circular reference {0} never reaches a constraint")]
    RefCycle(String),

    /// A schema is neither an object nor a boolean
    #[error("schema must be an object or a boolean, got {0}")]
    NotASchema(String),
}

/// One failed constraint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Location in the instance, `(root)` for the top level
    pub path: String,
    /// What went wrong
    pub description: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.description)
    }
}

/// Render violations as a 1-indexed, newline separated list
#[must_use]
pub fn violations_to_string(violations: &[Violation]) -> String {
    violations
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}. {v}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A checked schema fragment bound to its component registry
#[derive(Debug)]
pub struct Schema<'a> {
    root: &'a Json,
    components: Option<&'a ComponentMetadata>,
}

impl<'a> Schema<'a> {
    /// Check `root` and every component it reaches
    pub fn compile(
        root: &'a Json,
        components: Option<&'a ComponentMetadata>,
    ) -> Result<Self, SchemaError> {
        let schema = Self { root, components };
        let mut seen = HashSet::new();
        schema.check(root, &mut seen)?;
        let mut acyclic = HashSet::new();
        for reference in &seen {
            schema.check_ref_cycle(reference, &mut Vec::new(), &mut acyclic)?;
        }
        Ok(schema)
    }

    /// Validate `instance`, returning every violation found
    #[must_use]
    pub fn validate(&self, instance: &Json) -> Vec<Violation> {
        let mut out = Vec::new();
        self.validate_at(self.root, instance, "(root)", &mut out);
        out
    }

    fn resolve(&self, reference: &str) -> Result<&'a Json, SchemaError> {
        reference
            .strip_prefix(COMPONENT_REF_PREFIX)
            .and_then(|name| self.components?.schemas.get(name))
            .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))
    }

    /// Depth-first walk over references that apply to the same instance
    /// location. `items`, `properties` and `additionalProperties` move to a
    /// child and so cannot loop forever on a finite instance.
    fn check_ref_cycle(
        &self,
        reference: &str,
        active: &mut Vec<String>,
        acyclic: &mut HashSet<String>,
    ) -> Result<(), SchemaError> {
        if acyclic.contains(reference) {
            return Ok(());
        }
        if active.iter().any(|r| r == reference) {
            return Err(SchemaError::RefCycle(reference.to_string()));
        }
        let mut next = Vec::new();
        in_place_refs(self.resolve(reference)?, &mut next);
        active.push(reference.to_string());
        for target in next {
            self.check_ref_cycle(target, active, acyclic)?;
        }
        active.pop();
        acyclic.insert(reference.to_string());
        Ok(())
    }

    fn check(&self, schema: &'a Json, seen: &mut HashSet<String>) -> Result<(), SchemaError> {
        let obj = match schema {
            Json::Bool(_) => return Ok(()),
            Json::Object(obj) => obj,
            other => return Err(SchemaError::NotASchema(other.to_string())),
        };

        if let Some(reference) = obj.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| malformed("$ref", "a string"))?;
            let target = self.resolve(reference)?;
            if seen.insert(reference.to_string()) {
                self.check(target, seen)?;
            }
        }

        if let Some(ty) = obj.get("type") {
            match ty {
                Json::String(name) => check_type_name(name)?,
                Json::Array(names) => {
                    for name in names {
                        let name = name
                            .as_str()
                            .ok_or_else(|| malformed("type", "a string or list of strings"))?;
                        check_type_name(name)?;
                    }
                }
                _ => return Err(malformed("type", "a string or list of strings")),
            }
        }

        if let Some(props) = obj.get("properties") {
            let props = props.as_object().ok_or_else(|| malformed("properties", "an object"))?;
            for sub in props.values() {
                self.check(sub, seen)?;
            }
        }

        if let Some(required) = obj.get("required") {
            let ok = required
                .as_array()
                .is_some_and(|items| items.iter().all(Json::is_string));
            if !ok {
                return Err(malformed("required", "a list of strings"));
            }
        }

        if let Some(enumeration) = obj.get("enum") {
            if !enumeration.is_array() {
                return Err(malformed("enum", "a list"));
            }
        }

        for keyword in ["items", "not"] {
            if let Some(sub) = obj.get(keyword) {
                self.check(sub, seen)?;
            }
        }

        if let Some(additional) = obj.get("additionalProperties") {
            self.check(additional, seen)?;
        }

        for keyword in ["allOf", "anyOf", "oneOf"] {
            if let Some(list) = obj.get(keyword) {
                let list = list
                    .as_array()
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| malformed(keyword, "a non-empty list of schemas"))?;
                for sub in list {
                    self.check(sub, seen)?;
                }
            }
        }

        for keyword in ["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum"] {
            if obj.get(keyword).is_some_and(|v| !v.is_number()) {
                return Err(malformed(keyword, "a number"));
            }
        }

        for keyword in ["minLength", "maxLength", "minItems", "maxItems"] {
            if obj.get(keyword).is_some_and(|v| !v.is_u64()) {
                return Err(malformed(keyword, "a non-negative integer"));
            }
        }

        Ok(())
    }

    fn passes(&self, schema: &Json, instance: &Json, path: &str) -> bool {
        let mut scratch = Vec::new();
        self.validate_at(schema, instance, path, &mut scratch);
        scratch.is_empty()
    }

    fn validate_at(&self, schema: &Json, instance: &Json, path: &str, out: &mut Vec<Violation>) {
        let mut fail = |description: String| {
            out.push(Violation {
                path: path.to_string(),
                description,
            });
        };

        let obj = match schema {
            Json::Bool(true) => return,
            Json::Bool(false) => {
                fail("False always fails validation".to_string());
                return;
            }
            Json::Object(obj) => obj,
            _ => return,
        };

        if let Some(reference) = obj.get("$ref").and_then(Json::as_str) {
            if let Ok(target) = self.resolve(reference) {
                self.validate_at(target, instance, path, out);
            }
            return;
        }

        if let Some(ty) = obj.get("type") {
            let allowed: Vec<&str> = match ty {
                Json::String(name) => vec![name.as_str()],
                Json::Array(names) => names.iter().filter_map(Json::as_str).collect(),
                _ => Vec::new(),
            };
            if !allowed.iter().any(|name| type_matches(name, instance)) {
                fail(format!(
                    "Invalid type. Expected: {}, given: {}",
                    allowed.join("/"),
                    type_name(instance)
                ));
                return;
            }
        }

        if let Some(options) = obj.get("enum").and_then(Json::as_array) {
            if !options.contains(instance) {
                let rendered: Vec<String> = options.iter().map(Json::to_string).collect();
                fail(format!(
                    "must be one of the following: {}",
                    rendered.join(", ")
                ));
            }
        }

        if let Some(expected) = obj.get("const") {
            if expected != instance {
                fail(format!("Does not match: {expected}"));
            }
        }

        if let Some(n) = instance.as_f64() {
            check_bound(obj, "minimum", |b| n >= b, "Must be greater than or equal to", &mut fail);
            check_bound(obj, "maximum", |b| n <= b, "Must be less than or equal to", &mut fail);
            check_bound(obj, "exclusiveMinimum", |b| n > b, "Must be greater than", &mut fail);
            check_bound(obj, "exclusiveMaximum", |b| n < b, "Must be less than", &mut fail);
        }

        if let Some(s) = instance.as_str() {
            let len = s.chars().count() as u64;
            if let Some(min) = obj.get("minLength").and_then(Json::as_u64) {
                if len < min {
                    fail(format!("String length must be greater than or equal to {min}"));
                }
            }
            if let Some(max) = obj.get("maxLength").and_then(Json::as_u64) {
                if len > max {
                    fail(format!("String length must be less than or equal to {max}"));
                }
            }
        }

        if let Some(items) = instance.as_array() {
            let len = items.len() as u64;
            if let Some(min) = obj.get("minItems").and_then(Json::as_u64) {
                if len < min {
                    fail(format!("Array must have at least {min} items"));
                }
            }
            if let Some(max) = obj.get("maxItems").and_then(Json::as_u64) {
                if len > max {
                    fail(format!("Array must have at most {max} items"));
                }
            }
        }

        if let Some(fields) = instance.as_object() {
            if let Some(required) = obj.get("required").and_then(Json::as_array) {
                for name in required.iter().filter_map(Json::as_str) {
                    if !fields.contains_key(name) {
                        fail(format!("{name} is required"));
                    }
                }
            }
        }

        if let Some(items) = instance.as_array() {
            if let Some(item_schema) = obj.get("items") {
                for (i, item) in items.iter().enumerate() {
                    self.validate_at(item_schema, item, &child(path, &i.to_string()), out);
                }
            }
        }

        if let Some(fields) = instance.as_object() {
            self.validate_object(obj, fields, path, out);
        }

        self.validate_combinators(obj, instance, path, out);
    }

    fn validate_object(
        &self,
        obj: &Map<String, Json>,
        fields: &Map<String, Json>,
        path: &str,
        out: &mut Vec<Violation>,
    ) {
        let props = obj.get("properties").and_then(Json::as_object);
        // Reported in name order, whatever order the document used
        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (name, value) in sorted {
            let field_path = child(path, name);
            match props.and_then(|p| p.get(name)) {
                Some(sub) => self.validate_at(sub, value, &field_path, out),
                None => match obj.get("additionalProperties") {
                    Some(Json::Bool(false)) => out.push(Violation {
                        path: path.to_string(),
                        description: format!("Additional property {name} is not allowed"),
                    }),
                    Some(sub) => self.validate_at(sub, value, &field_path, out),
                    None => {}
                },
            }
        }
    }

    fn validate_combinators(
        &self,
        obj: &Map<String, Json>,
        instance: &Json,
        path: &str,
        out: &mut Vec<Violation>,
    ) {
        if let Some(all) = obj.get("allOf").and_then(Json::as_array) {
            for sub in all {
                self.validate_at(sub, instance, path, out);
            }
        }

        let violation = |description: &str| Violation {
            path: path.to_string(),
            description: description.to_string(),
        };

        if let Some(any) = obj.get("anyOf").and_then(Json::as_array) {
            if !any.iter().any(|sub| self.passes(sub, instance, path)) {
                out.push(violation("Must validate at least one schema (anyOf)"));
            }
        }

        if let Some(one) = obj.get("oneOf").and_then(Json::as_array) {
            let matched = one
                .iter()
                .filter(|sub| self.passes(sub, instance, path))
                .count();
            if matched != 1 {
                out.push(violation("Must validate one and only one schema (oneOf)"));
            }
        }

        if let Some(not) = obj.get("not") {
            if self.passes(not, instance, path) {
                out.push(violation("Must not validate the schema (not)"));
            }
        }
    }
}

fn in_place_refs<'s>(schema: &'s Json, out: &mut Vec<&'s str>) {
    let Json::Object(obj) = schema else {
        return;
    };
    if let Some(reference) = obj.get("$ref").and_then(Json::as_str) {
        out.push(reference);
    }
    if let Some(sub) = obj.get("not") {
        in_place_refs(sub, out);
    }
    for keyword in ["allOf", "anyOf", "oneOf"] {
        for sub in obj.get(keyword).and_then(Json::as_array).into_iter().flatten() {
            in_place_refs(sub, out);
        }
    }
}

fn malformed(keyword: &str, expected: &'static str) -> SchemaError {
    SchemaError::Malformed {
        keyword: keyword.to_string(),
        expected,
    }
}

fn check_type_name(name: &str) -> Result<(), SchemaError> {
    if TYPES.contains(&name) {
        Ok(())
    } else {
        Err(SchemaError::UnknownType(name.to_string()))
    }
}

fn check_bound(
    obj: &Map<String, Json>,
    keyword: &str,
    holds: impl Fn(f64) -> bool,
    message: &str,
    fail: &mut impl FnMut(String),
) {
    if let Some(bound) = obj.get(keyword) {
        if let Some(b) = bound.as_f64() {
            if !holds(b) {
                fail(format!("{message} {bound}"));
            }
        }
    }
}

fn child(path: &str, name: &str) -> String {
    if path == "(root)" {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_matches(name: &str, instance: &Json) -> bool {
    match name {
        "null" => instance.is_null(),
        "boolean" => instance.is_boolean(),
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Json::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => false,
    }
}

fn type_name(instance: &Json) -> &'static str {
    match instance {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components() -> ComponentMetadata {
        let mut components = ComponentMetadata::default();
        components.schemas.insert(
            "Asset".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "value": { "type": "integer", "minimum": 0 }
                },
                "required": ["id", "value"],
                "additionalProperties": false
            }),
        );
        components
    }

    fn check(schema: &Json, instance: &Json) -> Vec<String> {
        let components = components();
        Schema::compile(schema, Some(&components))
            .unwrap()
            .validate(instance)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_type_mismatch() {
        let errors = check(&json!({ "type": "string" }), &json!(5));
        assert_eq!(errors, vec!["(root): Invalid type. Expected: string, given: integer"]);
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        assert!(check(&json!({ "type": "integer" }), &json!(3.0)).is_empty());
        assert_eq!(check(&json!({ "type": "integer" }), &json!(3.5)).len(), 1);
    }

    #[test]
    fn test_ref_resolution() {
        let schema = json!({ "$ref": "#/components/schemas/Asset" });
        assert!(check(&schema, &json!({ "id": "a1", "value": 3 })).is_empty());

        let errors = check(&schema, &json!({ "id": "", "extra": true }));
        assert_eq!(
            errors,
            vec![
                "(root): value is required",
                "(root): Additional property extra is not allowed",
                "id: String length must be greater than or equal to 1",
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let schema = json!({
            "type": "array",
            "items": { "$ref": "#/components/schemas/Asset" }
        });
        let errors = check(&schema, &json!([{ "id": "a", "value": 1 }, { "id": "b", "value": -1 }]));
        assert_eq!(errors, vec!["1.value: Must be greater than or equal to 0"]);
    }

    #[test]
    fn test_enum_and_bounds() {
        let schema = json!({ "type": "string", "enum": ["red", "blue"] });
        assert_eq!(
            check(&schema, &json!("green")),
            vec![r#"(root): must be one of the following: "red", "blue""#]
        );

        let schema = json!({ "type": "number", "exclusiveMaximum": 10 });
        assert_eq!(check(&schema, &json!(10)), vec!["(root): Must be less than 10"]);
    }

    #[test]
    fn test_combinators() {
        let schema = json!({ "anyOf": [{ "type": "string" }, { "type": "null" }] });
        assert!(check(&schema, &Json::Null).is_empty());
        assert_eq!(check(&schema, &json!(1)).len(), 1);

        let schema = json!({ "oneOf": [{ "type": "number" }, { "type": "integer" }] });
        assert_eq!(check(&schema, &json!(1)).len(), 1);
    }

    #[test]
    fn test_compile_errors() {
        let components = components();
        let dangling = json!({ "$ref": "#/components/schemas/Missing" });
        assert_eq!(
            Schema::compile(&dangling, Some(&components)).unwrap_err(),
            SchemaError::UnresolvedRef("#/components/schemas/Missing".into())
        );

        let bad_type = json!({ "type": "text" });
        assert_eq!(
            Schema::compile(&bad_type, None).unwrap_err(),
            SchemaError::UnknownType("text".into())
        );

        let bad_min = json!({ "minLength": -1 });
        assert!(Schema::compile(&bad_min, None).is_err());
    }

    #[test]
    fn test_ref_cycles() {
        let mut components = components();
        components.schemas.insert(
            "Loop".to_string(),
            json!({ "$ref": "#/components/schemas/Loop" }),
        );
        components.schemas.insert(
            "Ping".to_string(),
            json!({ "allOf": [{ "type": "object" }, { "$ref": "#/components/schemas/Pong" }] }),
        );
        components.schemas.insert(
            "Pong".to_string(),
            json!({ "not": { "$ref": "#/components/schemas/Ping" } }),
        );
        components.schemas.insert(
            "Tree".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "children": { "type": "array", "items": { "$ref": "#/components/schemas/Tree" } }
                }
            }),
        );

        let looped = json!({ "$ref": "#/components/schemas/Loop" });
        assert_eq!(
            Schema::compile(&looped, Some(&components)).unwrap_err(),
            SchemaError::RefCycle("#/components/schemas/Loop".into())
        );

        let ping = json!({ "items": { "$ref": "#/components/schemas/Ping" } });
        assert!(matches!(
            Schema::compile(&ping, Some(&components)).unwrap_err(),
            SchemaError::RefCycle(_)
        ));

        let tree = json!({ "$ref": "#/components/schemas/Tree" });
        let schema = Schema::compile(&tree, Some(&components)).unwrap();
        assert!(schema
            .validate(&json!({ "children": [{ "children": [] }] }))
            .is_empty());
        assert_eq!(schema.validate(&json!({ "children": [1] })).len(), 1);
    }

    #[test]
    fn test_violation_list() {
        let violations = vec![
            Violation {
                path: "(root)".into(),
                description: "a".into(),
            },
            Violation {
                path: "x".into(),
                description: "b".into(),
            },
        ];
        assert_eq!(violations_to_string(&violations), "1. (root): a\n2. x: b");
    }
}
