use std::fmt;

use serde::{Deserialize, Serialize};

use super::Pointer;
use crate::{CanonicalizeError, DiffError, Node};

/// The kind of a patch [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// See [`Operation::Add`].
    Add,
    /// See [`Operation::Remove`].
    Remove,
    /// See [`Operation::Replace`].
    Replace,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        })
    }
}

/// A single edit operation.
///
/// The wire form is a JSON Patch object: `{"op":"add","path":"/a","value":1}`.
/// Removes carry the removed value under `value` and replaces carry the prior
/// value under `original_value`. Either may carry a `value_locator` object
/// that is resolved against the document at apply time.
///
/// ```
/// # use keypatch_core::{Node, Operation};
/// let op = Operation::replace("/v".parse()?, Node::from(2_i64), Node::from(9_i64));
/// assert_eq!(
///     serde_json::to_string(&op)?,
///     r#"{"op":"replace","path":"/v","value":9,"original_value":2}"#
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    /// Insert or overwrite `value` at `path`.
    Add {
        /// Target location.
        path: Pointer,
        /// The value to add.
        value: Node,
        /// Optional pattern resolving a `?` or `-` token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_locator: Option<Node>,
    },
    /// Delete the value at `path`.
    Remove {
        /// Target location.
        path: Pointer,
        /// The value being removed. `Void` when unknown.
        #[serde(rename = "value", default, skip_serializing_if = "Node::is_void")]
        original_value: Node,
        /// Optional pattern resolving a `?` or `-` token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_locator: Option<Node>,
    },
    /// Overwrite the value at `path`.
    Replace {
        /// Target location.
        path: Pointer,
        /// The new value.
        value: Node,
        /// The value being replaced. `Void` when the location was absent.
        #[serde(default, skip_serializing_if = "Node::is_void")]
        original_value: Node,
        /// Optional pattern resolving a `?` or `-` token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_locator: Option<Node>,
    },
}

impl Operation {
    /// Creates an add operation.
    #[must_use]
    pub fn add(path: Pointer, value: Node) -> Self {
        Self::Add { path, value, value_locator: None }
    }

    /// Creates a remove operation recording the removed value.
    #[must_use]
    pub fn remove(path: Pointer, original_value: Node) -> Self {
        Self::Remove { path, original_value, value_locator: None }
    }

    /// Creates a replace operation from `original_value` to `value`.
    #[must_use]
    pub fn replace(path: Pointer, original_value: Node, value: Node) -> Self {
        Self::Replace { path, value, original_value, value_locator: None }
    }

    /// Attaches a value locator.
    ///
    /// ```
    /// # use keypatch_core::{Node, Operation};
    /// let locator = Node::from_json_str(r#"{"id":"2"}"#)?;
    /// let op = Operation::remove("/items/?".parse()?, Node::Void).with_locator(locator.clone());
    /// assert_eq!(op.value_locator(), Some(&locator));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn with_locator(mut self, locator: Node) -> Self {
        match &mut self {
            Self::Add { value_locator, .. }
            | Self::Remove { value_locator, .. }
            | Self::Replace { value_locator, .. } => *value_locator = Some(locator),
        }
        self
    }

    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Remove { .. } => OperationKind::Remove,
            Self::Replace { .. } => OperationKind::Replace,
        }
    }

    /// Returns the (possibly unresolved) target path.
    #[must_use]
    pub fn path(&self) -> &Pointer {
        match self {
            Self::Add { path, .. } | Self::Remove { path, .. } | Self::Replace { path, .. } => path,
        }
    }

    /// Returns the value written by an add or replace.
    #[must_use]
    pub fn value(&self) -> Option<&Node> {
        match self {
            Self::Add { value, .. } | Self::Replace { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }

    /// Returns the value a remove or replace overwrites, when recorded.
    #[must_use]
    pub fn original_value(&self) -> Option<&Node> {
        match self {
            Self::Remove { original_value, .. } | Self::Replace { original_value, .. } => {
                Some(original_value).filter(|value| !value.is_void())
            }
            Self::Add { .. } => None,
        }
    }

    /// Returns the value locator, if any.
    #[must_use]
    pub fn value_locator(&self) -> Option<&Node> {
        match self {
            Self::Add { value_locator, .. }
            | Self::Remove { value_locator, .. }
            | Self::Replace { value_locator, .. } => value_locator.as_ref(),
        }
    }
}

/// An ordered list of [`Operation`]s.
///
/// ```
/// # use keypatch_core::{Node, Operation, Patch};
/// let patch = Patch::from_json_str(r#"[{"op":"add","path":"/-","value":3}]"#)?;
/// assert_eq!(patch.len(), 1);
/// let patched = Node::from_json_str("[1,2]")?.apply_patch(&patch)?;
/// assert_eq!(patched, Node::from_json_str("[1,2,3]")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    operations: Vec<Operation>,
}

impl Patch {
    /// Constructs an empty patch.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a patch from the provided operations.
    #[must_use]
    pub fn from_operations(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Indicates whether the patch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns an iterator over the operations.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Returns the operations as a slice.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Consumes the patch and returns the operations.
    #[must_use]
    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    /// Serializes the patch as compact JSON.
    pub fn to_json_string(&self) -> Result<String, DiffError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the patch as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, DiffError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serializes the patch into a JSON value.
    pub fn to_json_value(&self) -> Result<serde_json::Value, DiffError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a patch from its JSON wire form.
    pub fn from_json_str(input: &str) -> Result<Self, CanonicalizeError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parses a patch from a JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, CanonicalizeError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl IntoIterator for Patch {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

impl From<Vec<Operation>> for Patch {
    fn from(value: Vec<Operation>) -> Self {
        Self::from_operations(value)
    }
}

impl FromIterator<Operation> for Patch {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self::from_operations(iter.into_iter().collect())
    }
}
