//! Diff data structures and algorithms.
//!
//! The differ walks a source and a target [`Node`] in lock step and records
//! every difference through a [`PatchBuilder`]. Objects are compared field by
//! field; arrays are reconciled either by element value or, when a key field
//! is configured for the array's pointer, by the value of that field.

mod builder;
mod list;
mod object;
mod operation;
mod pointer;
mod primitives;

pub use builder::PatchBuilder;
pub use operation::{Operation, OperationKind, Patch};
pub use pointer::{Pointer, Token};

use crate::{DiffError, DiffOptions, Node};

/// Computes the patch transforming `source` into `target`.
///
/// ```
/// # use keypatch_core::{DiffOptions, Node};
/// let source = Node::from_json_str(r#"{"a":1,"b":2}"#)?;
/// let target = Node::from_json_str(r#"{"b":2,"c":3}"#)?;
/// let patch = keypatch_core::diff::diff_nodes(&source, &target, &DiffOptions::default())?;
/// let ops: Vec<String> = patch.iter().map(|op| format!("{} {}", op.kind(), op.path())).collect();
/// assert_eq!(ops, ["remove /a", "add /c"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn diff_nodes(source: &Node, target: &Node, options: &DiffOptions) -> Result<Patch, DiffError> {
    if source.is_void() || target.is_void() {
        return Err(DiffError::NullInput);
    }
    let limit = options.max_depth();
    if let Some(pointer) = source.nested_beyond(limit).or_else(|| target.nested_beyond(limit)) {
        return Err(DiffError::DepthExceeded { pointer, limit });
    }
    let mut differ = Differ::new(options);
    differ.diff_node(source, target, &Pointer::root())?;
    Ok(differ.builder.into_patch())
}

/// Per-call differ state.
struct Differ<'o> {
    options: &'o DiffOptions,
    builder: PatchBuilder,
}

impl<'o> Differ<'o> {
    fn new(options: &'o DiffOptions) -> Self {
        Self { options, builder: PatchBuilder::new() }
    }

    fn diff_node(
        &mut self,
        source: &Node,
        target: &Node,
        pointer: &Pointer,
    ) -> Result<(), DiffError> {
        if source == target {
            return Ok(());
        }
        if primitives::diff_emptiness(&mut self.builder, source, target, pointer) {
            return Ok(());
        }

        match (source, target) {
            (Node::Object(source), Node::Object(target)) => self.diff_objects(source, target, pointer),
            (Node::Array(source), Node::Array(target)) => self.diff_arrays(source, target, pointer),
            _ => {
                primitives::diff_primitives(&mut self.builder, source, target, pointer);
                Ok(())
            }
        }
    }
}
