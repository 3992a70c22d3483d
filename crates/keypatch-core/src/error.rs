use thiserror::Error;

use crate::Pointer;

/// Errors that can occur while canonicalizing external data into [`Node`](crate::Node).
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The provided JSON input was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The provided YAML input was invalid.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Encountered a number that cannot be represented as an IEEE-754 f64.
    #[error("number {value} cannot be represented as f64")]
    NumberOutOfRange {
        /// The textual representation of the offending number.
        value: String,
    },
    /// YAML maps may only contain string keys.
    #[error("unsupported YAML key type: {found}")]
    NonStringYamlKey {
        /// A description of the key that triggered the error.
        found: String,
    },
    /// YAML tags have no JSON counterpart and are rejected.
    #[error("unsupported YAML tag: {tag}")]
    UnsupportedYamlTag {
        /// The tag identifier encountered in the document.
        tag: String,
    },
    /// Attempted to construct a [`Number`](crate::Number) that is not finite.
    #[error("non-finite number encountered: {value}")]
    NotFinite {
        /// The offending numeric value.
        value: f64,
    },
}

/// Errors produced while parsing the textual form of a [`Pointer`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// Non-empty pointers must start with `/`.
    #[error("pointer {pointer:?} must be empty or start with '/'")]
    MissingLeadingSlash {
        /// The rejected input.
        pointer: String,
    },
    /// A `~` was not followed by `0` or `1`.
    #[error("invalid escape sequence in pointer {pointer:?}")]
    InvalidEscape {
        /// The rejected input.
        pointer: String,
    },
}

/// Errors emitted when constructing [`DiffOptions`](crate::DiffOptions) or
/// [`ApplyOptions`](crate::ApplyOptions).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// Key field names must be non-empty strings.
    #[error("key field for {pointer} must be a non-empty string")]
    EmptyKeyField {
        /// The array pointer the key was configured for.
        pointer: Pointer,
    },
    /// Key pointers must address a concrete array location.
    #[error("key pointer {pointer} must not contain '-' or '?'")]
    AmbiguousKeyPointer {
        /// The rejected pointer.
        pointer: Pointer,
    },
    /// Recursion limits must allow at least one level.
    #[error("maximum depth must be greater than zero")]
    ZeroDepth,
}

/// Errors that abort a diff. Partial patches are never returned.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The source or target document is absent.
    #[error("cannot diff an absent document")]
    NullInput,
    /// An element of a keyed array has no string value for the key field.
    #[error("key field {key:?} missing or not a string on element {index} of array {pointer}")]
    KeyFieldMissing {
        /// Pointer of the keyed array.
        pointer: Pointer,
        /// Index of the offending element within its array.
        index: usize,
        /// The configured key field.
        key: String,
    },
    /// The computed patch could not be serialized or read back.
    #[error("cannot serialize patch: {0}")]
    SerializationFailure(#[from] serde_json::Error),
    /// The documents nest deeper than the configured limit.
    #[error("document nesting at {pointer} exceeds maximum depth {limit}")]
    DepthExceeded {
        /// Where the limit was hit.
        pointer: Pointer,
        /// The configured limit.
        limit: usize,
    },
}

/// Errors that abort an apply.
///
/// ```
/// # use keypatch_core::{Node, Operation, Patch, PatchError};
/// let patch = Patch::from_operations(vec![Operation::remove("/missing".parse()?, Node::Null)]);
/// let err = Node::from_json_str("{}")?.apply_patch(&patch).unwrap_err();
/// assert!(matches!(err, PatchError::NoSuchPath { .. }));
/// assert_eq!(err.to_string(), "no value at /missing");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The document to patch is absent.
    #[error("cannot apply a patch to an absent document")]
    NullInput,
    /// The parent of the target location is a scalar.
    #[error("parent of {path} is not an array or object")]
    ParentNotContainer {
        /// Target path of the failing operation.
        path: Pointer,
    },
    /// An array was addressed with a token that is not an index.
    #[error("token {token:?} in {path} is not an array index")]
    NotAnIndex {
        /// Target path of the failing operation.
        path: Pointer,
        /// The offending token.
        token: String,
    },
    /// An array index is outside the valid range for the operation.
    #[error("index {index} in {path} is out of range for array of length {len}")]
    IndexOutOfRange {
        /// Target path of the failing operation.
        path: Pointer,
        /// The requested index.
        index: usize,
        /// Length of the addressed array.
        len: usize,
    },
    /// The target (or its parent) does not exist.
    #[error("no value at {path}")]
    NoSuchPath {
        /// Target path of the failing operation.
        path: Pointer,
    },
    /// `-` was used on an object with a non-object value.
    #[error("cannot append to object at {path}")]
    AppendToObject {
        /// Target path of the failing operation.
        path: Pointer,
    },
    /// The document root cannot be removed.
    #[error("cannot remove the document root")]
    RootRemoval,
    /// A value locator was supplied that is not an object.
    #[error("value locator for {path} must be an object")]
    LocatorNotObject {
        /// Unresolved path of the failing operation.
        path: Pointer,
    },
    /// No array element matched the value locator.
    #[error("no array element matches the value locator for {path}")]
    LocatorNoMatch {
        /// Unresolved path of the failing operation.
        path: Pointer,
    },
    /// The placeholder is not in a position the resolver understands.
    #[error("placeholder in {path} must be the last or second-to-last token")]
    PlaceholderPosition {
        /// Unresolved path of the failing operation.
        path: Pointer,
    },
    /// The path is longer than the configured limit.
    #[error("path {path} exceeds maximum depth {limit}")]
    DepthExceeded {
        /// Target path of the failing operation.
        path: Pointer,
        /// The configured limit.
        limit: usize,
    },
}
