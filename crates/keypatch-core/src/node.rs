use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::{
    ApplyOptions, CanonicalizeError, DiffError, DiffOptions, Number, Patch, PatchError, Pointer,
    Token,
};

/// The document model manipulated by the differ and the apply engine.
///
/// Equality is structural: object field order is irrelevant and numbers
/// compare by value.
///
/// ```
/// # use keypatch_core::Node;
/// let lhs = Node::from_json_str(r#"{"a":1,"b":[true]}"#)?;
/// let rhs = Node::from_json_str(r#"{"b":[true],"a":1.0}"#)?;
/// assert_eq!(lhs, rhs);
/// # Ok::<(), keypatch_core::CanonicalizeError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Node {
    /// Sentinel representing an absent document.
    #[default]
    Void,
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(Number),
    /// JSON string.
    String(String),
    /// JSON array.
    Array(Vec<Node>),
    /// JSON object with deterministic key ordering.
    Object(BTreeMap<String, Node>),
}

/// The fundamental kind of a [`Node`], used to classify differences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// See [`Node::Void`].
    Void,
    /// See [`Node::Null`].
    Null,
    /// See [`Node::Bool`].
    Bool,
    /// See [`Node::Number`].
    Number,
    /// See [`Node::String`].
    String,
    /// See [`Node::Array`].
    Array,
    /// See [`Node::Object`].
    Object,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

impl Node {
    /// Parses a JSON string. Whitespace-only input yields [`Node::Void`].
    ///
    /// ```
    /// # use keypatch_core::Node;
    /// let node = Node::from_json_str("{\"hello\":\"world\"}")?;
    /// assert!(matches!(node, Node::Object(_)));
    /// assert!(Node::from_json_str("  \n")?.is_void());
    /// # Ok::<(), keypatch_core::CanonicalizeError>(())
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self, CanonicalizeError> {
        if input.trim().is_empty() {
            return Ok(Self::Void);
        }
        let value: JsonValue = serde_json::from_str(input)?;
        Self::from_json_value(value)
    }

    /// Parses a YAML string. Whitespace-only input yields [`Node::Void`].
    ///
    /// ```
    /// # use keypatch_core::Node;
    /// let node = Node::from_yaml_str("---\nanswer: 42\n")?;
    /// assert_eq!(node, Node::from_json_str(r#"{"answer":42}"#)?);
    /// # Ok::<(), keypatch_core::CanonicalizeError>(())
    /// ```
    pub fn from_yaml_str(input: &str) -> Result<Self, CanonicalizeError> {
        if input.trim().is_empty() {
            return Ok(Self::Void);
        }
        let value: YamlValue = serde_yaml::from_str(input)?;
        Self::from_yaml_value(value)
    }

    /// Converts a serde JSON value into a [`Node`].
    pub fn from_json_value(value: JsonValue) -> Result<Self, CanonicalizeError> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(v) => Ok(Self::Bool(v)),
            JsonValue::Number(num) => {
                let Some(as_f64) = num.as_f64() else {
                    return Err(CanonicalizeError::NumberOutOfRange { value: num.to_string() });
                };
                Ok(Self::Number(Number::new(as_f64)?))
            }
            JsonValue::String(s) => Ok(Self::String(s)),
            JsonValue::Array(values) => {
                values.into_iter().map(Self::from_json_value).collect::<Result<_, _>>().map(Self::Array)
            }
            JsonValue::Object(map) => {
                let mut object = BTreeMap::new();
                for (key, value) in map {
                    object.insert(key, Self::from_json_value(value)?);
                }
                Ok(Self::Object(object))
            }
        }
    }

    fn from_yaml_value(value: YamlValue) -> Result<Self, CanonicalizeError> {
        match value {
            YamlValue::Null => Ok(Self::Null),
            YamlValue::Bool(v) => Ok(Self::Bool(v)),
            YamlValue::Number(num) => {
                if let Some(f) = num.as_f64() {
                    return Ok(Self::Number(Number::new(f)?));
                }
                Err(CanonicalizeError::NumberOutOfRange { value: num.to_string() })
            }
            YamlValue::String(s) => Ok(Self::String(s)),
            YamlValue::Sequence(seq) => {
                seq.into_iter().map(Self::from_yaml_value).collect::<Result<_, _>>().map(Self::Array)
            }
            YamlValue::Mapping(map) => {
                let mut object = BTreeMap::new();
                for (key, value) in map {
                    let key = match key {
                        YamlValue::String(s) => s,
                        other => {
                            return Err(CanonicalizeError::NonStringYamlKey {
                                found: format!("{other:?}"),
                            });
                        }
                    };
                    object.insert(key, Self::from_yaml_value(value)?);
                }
                Ok(Self::Object(object))
            }
            YamlValue::Tagged(tagged) => {
                Err(CanonicalizeError::UnsupportedYamlTag { tag: tagged.tag.to_string() })
            }
        }
    }

    /// Converts the node into a serde JSON value.
    ///
    /// Returns `None` when the node contains the `Void` sentinel, which has
    /// no JSON representation.
    #[must_use]
    pub fn to_json_value(&self) -> Option<JsonValue> {
        match self {
            Self::Void => None,
            Self::Null => Some(JsonValue::Null),
            Self::Bool(v) => Some(JsonValue::Bool(*v)),
            Self::Number(n) => Some(JsonValue::Number(n.to_json_number())),
            Self::String(s) => Some(JsonValue::String(s.clone())),
            Self::Array(values) => {
                values.iter().map(Self::to_json_value).collect::<Option<_>>().map(JsonValue::Array)
            }
            Self::Object(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json_value()?);
                }
                Some(JsonValue::Object(object))
            }
        }
    }

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Void => NodeKind::Void,
            Self::Null => NodeKind::Null,
            Self::Bool(_) => NodeKind::Bool,
            Self::Number(_) => NodeKind::Number,
            Self::String(_) => NodeKind::String,
            Self::Array(_) => NodeKind::Array,
            Self::Object(_) => NodeKind::Object,
        }
    }

    /// Whether this is the absent-document sentinel.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Whether the node is an array or an object.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    /// Whether the node counts as empty: `null`, `[]` or `{}`.
    ///
    /// ```
    /// # use keypatch_core::Node;
    /// assert!(Node::Null.is_empty_value());
    /// assert!(Node::from_json_str("[]")?.is_empty_value());
    /// assert!(!Node::from_json_str("0")?.is_empty_value());
    /// # Ok::<(), keypatch_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Array(items) => items.is_empty(),
            Self::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object payload, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the first location nested more than `limit` levels deep.
    ///
    /// Walks with an explicit stack so that arbitrarily deep input cannot
    /// exhaust the call stack.
    pub(crate) fn nested_beyond(&self, limit: usize) -> Option<Pointer> {
        let mut tokens = Vec::new();
        let mut pending = vec![(None, self, 0_usize)];
        while let Some((token, node, depth)) = pending.pop() {
            tokens.truncate(depth.saturating_sub(1));
            tokens.extend(token);
            if depth > limit {
                return Some(Pointer::from(tokens));
            }
            let depth = depth + 1;
            match node {
                Self::Object(fields) => {
                    pending.extend(fields.iter().rev().map(|(field, child)| (Some(Token::key(field)), child, depth)));
                }
                Self::Array(items) => {
                    let children = items.iter().enumerate().rev();
                    pending.extend(children.map(|(index, child)| (Some(Token::Index(index)), child, depth)));
                }
                _ => {}
            }
        }
        None
    }

    /// Computes the patch transforming this node into `other`.
    ///
    /// ```
    /// # use keypatch_core::{DiffOptions, Node};
    /// let lhs = Node::from_json_str(r#"{"v":1}"#)?;
    /// let rhs = Node::from_json_str(r#"{"v":2}"#)?;
    /// let patch = lhs.diff(&rhs, &DiffOptions::default())?;
    /// assert_eq!(patch.len(), 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn diff(&self, other: &Self, options: &DiffOptions) -> Result<Patch, DiffError> {
        crate::diff::diff_nodes(self, other, options)
    }

    /// Applies a patch in strict mode, returning the patched copy.
    ///
    /// ```
    /// # use keypatch_core::{DiffOptions, Node};
    /// let base = Node::from_json_str("[1,2,3]")?;
    /// let target = Node::from_json_str("[1,3,4]")?;
    /// let patch = base.diff(&target, &DiffOptions::default())?;
    /// assert_eq!(base.apply_patch(&patch)?, target);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn apply_patch(&self, patch: &Patch) -> Result<Self, PatchError> {
        crate::patch::apply_patch(self, patch, &ApplyOptions::default())
    }

    /// Applies a patch with explicit options.
    pub fn apply_patch_with(&self, patch: &Patch, options: &ApplyOptions) -> Result<Self, PatchError> {
        crate::patch::apply_patch(self, patch, options)
    }
}

impl TryFrom<JsonValue> for Node {
    type Error = CanonicalizeError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Self::from_json_value(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Void | Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(values) => serializer.collect_seq(values),
            Self::Object(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        Self::from_json_value(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json_value() {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{
        collection::{btree_map, vec},
        prelude::*,
        string::string_regex,
    };

    fn arb_json_value() -> impl Strategy<Value = JsonValue> {
        let leaf = prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            proptest::num::f64::ANY.prop_filter_map("finite", |f| {
                if f.is_finite() {
                    serde_json::Number::from_f64(f).map(JsonValue::Number)
                } else {
                    None
                }
            }),
            string_regex("[a-zA-Z0-9]{0,8}").unwrap().prop_map(JsonValue::String),
        ];
        leaf.prop_recursive(4, 8, 4, move |inner| {
            prop_oneof![
                vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
                btree_map(string_regex("[a-zA-Z0-9]{1,8}").unwrap(), inner, 0..4).prop_map(|map| {
                    JsonValue::Object(map.into_iter().collect())
                }),
            ]
        })
    }

    #[test]
    fn json_number_to_json_value_is_minimal() {
        let node = Node::from_json_str("5").unwrap();
        assert_eq!(node.to_json_value().unwrap(), serde_json::json!(5));
    }

    #[test]
    fn integer_and_float_are_equal() {
        assert_eq!(Node::from_json_str("1").unwrap(), Node::from_json_str("1.0").unwrap());
        assert_ne!(Node::from_json_str("1").unwrap(), Node::from_json_str("\"1\"").unwrap());
    }

    #[test]
    fn json_number_out_of_range_yields_error() {
        let err = Node::from_json_str("1e400").unwrap_err();
        match err {
            CanonicalizeError::NumberOutOfRange { .. } | CanonicalizeError::Json(_) => {}
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn yaml_non_string_key_errors() {
        let err = Node::from_yaml_str("? [1, 2]: 3").unwrap_err();
        let CanonicalizeError::NonStringYamlKey { .. } = err else {
            panic!("expected NonStringYamlKey error");
        };
    }

    #[test]
    fn serializes_as_plain_json() {
        let node = Node::from_json_str(r#"{"b":[1,2.5,null],"a":"x"}"#).unwrap();
        assert_eq!(serde_json::to_string(&node).unwrap(), r#"{"a":"x","b":[1,2.5,null]}"#);
        let back: Node = serde_json::from_str(r#"{"a":"x","b":[1,2.5,null]}"#).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn empty_values_are_classified() {
        for text in ["null", "[]", "{}"] {
            assert!(Node::from_json_str(text).unwrap().is_empty_value(), "{text}");
        }
        for text in ["0", "false", "\"\"", "[null]"] {
            assert!(!Node::from_json_str(text).unwrap().is_empty_value(), "{text}");
        }
    }

    proptest! {
        #[test]
        fn json_roundtrips_through_node(value in arb_json_value()) {
            let node = Node::from_json_value(value.clone()).unwrap();
            let reconstructed = node.to_json_value().unwrap();
            let node_again = Node::from_json_value(reconstructed).unwrap();
            prop_assert_eq!(node_again, node);
        }
    }

    #[test]
    fn nested_beyond_reports_first_deep_location() {
        let node = Node::from_json_str(r#"{"a":[{"b":1}],"c":{"d":{}}}"#).unwrap();
        assert_eq!(node.nested_beyond(2), Some("/a/0/b".parse().unwrap()));
        assert_eq!(node.nested_beyond(3), None);
        assert_eq!(Node::Null.nested_beyond(0), None);
    }
}
