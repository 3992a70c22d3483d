//! Structural diff and patch for JSON-like documents.
//!
//! `keypatch-core` computes a JSON Patch style list of operations turning
//! one document into another and applies such patches. Arrays are reconciled
//! order-insensitively, either by element value or, for arrays of records,
//! by a configured key field. At apply time, `?` placeholders are resolved
//! through value locators and adds create missing intermediate containers.
//!
//! ```
//! use keypatch_core::{DiffOptions, Node};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let base = Node::from_json_str(r#"{"users":[{"id":"1","age":30},{"id":"2","age":40}]}"#)?;
//!     let target = Node::from_json_str(r#"{"users":[{"id":"2","age":41}]}"#)?;
//!     let options = DiffOptions::default().with_key_field("/users".parse()?, Some("id"))?;
//!
//!     let patch = keypatch_core::diff(&base, &target, &options)?;
//!     assert_eq!(
//!         patch.to_json_string()?,
//!         concat!(
//!             r#"[{"op":"remove","path":"/users/0","value":{"age":30,"id":"1"}},"#,
//!             r#"{"op":"replace","path":"/users/0/age","value":41,"original_value":40}]"#,
//!         )
//!     );
//!
//!     let patched = keypatch_core::apply(&base, &patch)?;
//!     assert_eq!(patched, target);
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod diff;
mod error;
mod node;
mod number;
mod options;
mod patch;

pub use diff::{Operation, OperationKind, Patch, PatchBuilder, Pointer, Token};
pub use error::{CanonicalizeError, DiffError, OptionsError, PatchError, PointerError};
pub use node::{Node, NodeKind};
pub use number::Number;
pub use options::{ApplyOptions, DiffOptions, DEFAULT_MAX_DEPTH};

/// Computes the patch transforming `source` into `target`.
pub fn diff(source: &Node, target: &Node, options: &DiffOptions) -> Result<Patch, DiffError> {
    diff::diff_nodes(source, target, options)
}

/// Computes a patch using value-identity reconciliation for every array.
///
/// ```
/// # use keypatch_core::Node;
/// let patch = keypatch_core::as_patch(&Node::from_json_str("null")?, &Node::from_json_str("[]")?)?;
/// assert!(patch.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn as_patch(source: &Node, target: &Node) -> Result<Patch, DiffError> {
    diff::diff_nodes(source, target, &DiffOptions::default())
}

/// Computes the patch and returns its JSON wire form as a value.
///
/// The patch is serialized and read back, so the result is exactly what a
/// consumer of the textual form would see.
///
/// ```
/// # use keypatch_core::{DiffOptions, Node};
/// let json = keypatch_core::diff_to_json(
///     &Node::from_json_str("[1]")?,
///     &Node::from_json_str("[1,2]")?,
///     &DiffOptions::default(),
/// )?;
/// assert_eq!(json, serde_json::json!([{"op":"add","path":"/-","value":2}]));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn diff_to_json(
    source: &Node,
    target: &Node,
    options: &DiffOptions,
) -> Result<serde_json::Value, DiffError> {
    let patch = diff::diff_nodes(source, target, options)?;
    let text = patch.to_json_string()?;
    Ok(serde_json::from_str(&text)?)
}

/// Applies `patch` to `document` in strict mode.
pub fn apply(document: &Node, patch: &Patch) -> Result<Node, PatchError> {
    patch::apply_patch(document, patch, &ApplyOptions::default())
}

/// Applies `patch` to `document` with explicit options.
///
/// ```
/// # use keypatch_core::{ApplyOptions, Node, Patch};
/// let patch = Patch::from_json_str(
///     r#"[{"op":"remove","path":"/?","value_locator":{"id":"9"}},{"op":"add","path":"/-","value":3}]"#,
/// )?;
/// let patched = keypatch_core::apply_with(&Node::from_json_str("[1,2]")?, &patch, &ApplyOptions::lenient())?;
/// assert_eq!(patched, Node::from_json_str("[1,2,3]")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn apply_with(document: &Node, patch: &Patch, options: &ApplyOptions) -> Result<Node, PatchError> {
    patch::apply_patch(document, patch, options)
}

/// Returns the semantic version of the `keypatch-core` crate.
///
/// ```
/// assert!(!keypatch_core::version().is_empty());
/// ```
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
