//! Patch application engine.
//!
//! Operations are interpreted in order against a private copy of the
//! document. Placeholder paths are resolved first (see [`locator`]); adds
//! whose parent does not exist synthesize the missing containers.

mod locator;

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::{ApplyOptions, Node, Operation, Patch, PatchError, Pointer, Token};

pub(crate) use locator::matches_locator;

pub(crate) fn apply_patch(document: &Node, patch: &Patch, options: &ApplyOptions) -> Result<Node, PatchError> {
    if document.is_void() {
        return Err(PatchError::NullInput);
    }
    let limit = options.max_depth();
    if let Some(path) = document.nested_beyond(limit) {
        return Err(PatchError::DepthExceeded { path, limit });
    }
    for operation in patch {
        if operation.value().is_some_and(|value| value.nested_beyond(limit).is_some()) {
            return Err(PatchError::DepthExceeded { path: operation.path().clone(), limit });
        }
    }
    let mut working = document.clone();
    for operation in patch {
        let Some(path) = locator::resolve_path(operation, &working, options.strict())? else {
            continue;
        };
        if path.len() > options.max_depth() {
            return Err(PatchError::DepthExceeded { path, limit: options.max_depth() });
        }
        debug!(op = %operation.kind(), path = %path, "applying operation");
        match operation {
            Operation::Add { value, .. } => add(&mut working, &path, value.clone())?,
            Operation::Remove { .. } => {
                remove(&mut working, &path)?;
            }
            Operation::Replace { value, .. } => replace(&mut working, &path, value.clone())?,
        }
    }
    Ok(working)
}

fn add(document: &mut Node, path: &Pointer, value: Node) -> Result<(), PatchError> {
    if value.is_void() {
        return Err(PatchError::NullInput);
    }
    let Some((last, parent)) = path.tokens().split_last() else {
        *document = value;
        return Ok(());
    };
    let parent = Pointer::from(parent.to_vec());
    match parent.resolve_mut(document) {
        Some(Node::Array(items)) => {
            let index = match last {
                Token::Append => items.len(),
                Token::Index(index) => *index,
                other => return Err(not_an_index(path, other)),
            };
            if index > items.len() {
                return Err(PatchError::IndexOutOfRange { path: path.clone(), index, len: items.len() });
            }
            insert_unique(items, index, value);
            Ok(())
        }
        Some(Node::Object(fields)) => insert_field(fields, path, last, value),
        Some(_) => Err(PatchError::ParentNotContainer { path: path.clone() }),
        None => synthesize(document, path, value),
    }
}

/// Creates the containers missing between the longest existing prefix of
/// `path` and its final token, then attaches them to that prefix.
fn synthesize(document: &mut Node, path: &Pointer, value: Node) -> Result<(), PatchError> {
    let tokens = path.tokens();
    let existing =
        (0..tokens.len()).rev().find(|&len| path.prefix(len).resolve(document).is_some()).unwrap_or(0);
    let prefix = path.prefix(existing);
    trace!(path = %path, existing = %prefix, "synthesizing missing containers");

    let Some((first, rest)) = tokens[existing..].split_first() else {
        return Err(PatchError::NoSuchPath { path: path.clone() });
    };
    let inner = rest.iter().rev().fold(value, |node, token| wrap(token, node));

    match prefix.resolve_mut(document) {
        Some(Node::Object(fields)) => insert_field(fields, path, first, inner),
        Some(Node::Array(items)) => {
            let element = if first.is_array_like() { inner } else { wrap(first, inner) };
            let len = items.len();
            insert_unique(items, len, element);
            Ok(())
        }
        Some(_) => Err(PatchError::ParentNotContainer { path: path.clone() }),
        None => Err(PatchError::NoSuchPath { path: path.clone() }),
    }
}

fn wrap(token: &Token, node: Node) -> Node {
    if token.is_array_like() {
        Node::Array(vec![node])
    } else {
        Node::Object(BTreeMap::from([(token.as_raw().into_owned(), node)]))
    }
}

/// Inserts `value` at `index` unless an equal element is already present.
fn insert_unique(items: &mut Vec<Node>, index: usize, value: Node) {
    if items.contains(&value) {
        trace!(%value, "value already present in array");
        return;
    }
    items.insert(index, value);
}

fn insert_field(
    fields: &mut BTreeMap<String, Node>,
    path: &Pointer,
    token: &Token,
    value: Node,
) -> Result<(), PatchError> {
    if *token == Token::Append && !matches!(value, Node::Object(_)) {
        return Err(PatchError::AppendToObject { path: path.clone() });
    }
    fields.insert(token.as_raw().into_owned(), value);
    Ok(())
}

fn remove(document: &mut Node, path: &Pointer) -> Result<Node, PatchError> {
    let Some((last, parent)) = path.tokens().split_last() else {
        return Err(PatchError::RootRemoval);
    };
    let parent = Pointer::from(parent.to_vec());
    match parent.resolve_mut(document) {
        Some(Node::Object(fields)) => {
            fields.remove(last.as_raw().as_ref()).ok_or_else(|| PatchError::NoSuchPath { path: path.clone() })
        }
        Some(Node::Array(items)) => {
            let index = existing_index(items, path, last)?;
            Ok(items.remove(index))
        }
        Some(_) => Err(PatchError::ParentNotContainer { path: path.clone() }),
        None => Err(PatchError::NoSuchPath { path: path.clone() }),
    }
}

fn replace(document: &mut Node, path: &Pointer, value: Node) -> Result<(), PatchError> {
    if value.is_void() {
        return Err(PatchError::NullInput);
    }
    let Some((last, parent)) = path.tokens().split_last() else {
        *document = value;
        return Ok(());
    };
    let parent = Pointer::from(parent.to_vec());
    match parent.resolve_mut(document) {
        Some(Node::Object(fields)) => {
            fields.insert(last.as_raw().into_owned(), value);
            Ok(())
        }
        Some(Node::Array(items)) => {
            let index = existing_index(items, path, last)?;
            items[index] = value;
            Ok(())
        }
        Some(_) => Err(PatchError::ParentNotContainer { path: path.clone() }),
        None => Err(PatchError::NoSuchPath { path: path.clone() }),
    }
}

fn existing_index(items: &[Node], path: &Pointer, token: &Token) -> Result<usize, PatchError> {
    let Token::Index(index) = token else {
        return Err(not_an_index(path, token));
    };
    if *index >= items.len() {
        return Err(PatchError::IndexOutOfRange { path: path.clone(), index: *index, len: items.len() });
    }
    Ok(*index)
}

fn not_an_index(path: &Pointer, token: &Token) -> PatchError {
    PatchError::NotAnIndex { path: path.clone(), token: token.to_string() }
}
