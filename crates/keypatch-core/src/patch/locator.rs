//! Value locator resolution.
//!
//! A placeholder token (`?`, or `-` when the operation carries a locator)
//! is replaced by the index of the first element of the addressed array
//! that matches the locator object.

use std::collections::BTreeMap;

use tracing::warn;

use crate::{Node, Operation, PatchError, Pointer, Token};

/// Whether `element` is an object carrying every locator field with an
/// equal value.
pub(crate) fn matches_locator(element: &Node, locator: &BTreeMap<String, Node>) -> bool {
    let Node::Object(fields) = element else {
        return false;
    };
    locator.iter().all(|(name, expected)| fields.get(name) == Some(expected))
}

/// Returns the concrete path for `operation`, or `None` when the operation
/// is to be skipped.
pub(super) fn resolve_path(
    operation: &Operation,
    document: &Node,
    strict: bool,
) -> Result<Option<Pointer>, PatchError> {
    let path = operation.path();
    let locator = operation.value_locator();
    let Some(placeholder) = placeholder_position(path, locator.is_some()) else {
        return Ok(Some(path.clone()));
    };

    let tokens = path.tokens();
    if placeholder + 2 < tokens.len() || tokens[..placeholder].contains(&Token::Locate) {
        return Err(PatchError::PlaceholderPosition { path: path.clone() });
    }

    let Some(locator) = locator else {
        // Without a locator a trailing `?` addresses the array itself.
        if placeholder + 1 == tokens.len() {
            return Ok(path.parent());
        }
        return Err(PatchError::PlaceholderPosition { path: path.clone() });
    };
    let Node::Object(pattern) = locator else {
        return Err(PatchError::LocatorNotObject { path: path.clone() });
    };

    let array = path.prefix(placeholder);
    let found = match array.resolve(document) {
        Some(Node::Array(items)) => items.iter().position(|item| matches_locator(item, pattern)),
        _ => None,
    };

    match found {
        Some(index) => {
            let mut resolved = tokens.to_vec();
            resolved[placeholder] = Token::Index(index);
            Ok(Some(Pointer::from(resolved)))
        }
        None if strict => Err(PatchError::LocatorNoMatch { path: path.clone() }),
        None => {
            warn!(path = %path, locator = %locator, "no array element matches value locator, skipping operation");
            Ok(None)
        }
    }
}

/// Finds the token to resolve: the last `?`, or with a locator a `-` among
/// the final two tokens.
fn placeholder_position(path: &Pointer, has_locator: bool) -> Option<usize> {
    let tokens = path.tokens();
    if let Some(position) = tokens.iter().rposition(|token| *token == Token::Locate) {
        return Some(position);
    }
    if !has_locator {
        return None;
    }
    let tail = tokens.len().saturating_sub(2);
    tokens[tail..].iter().rposition(|token| *token == Token::Append).map(|offset| tail + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApplyOptions, Patch};

    fn node(json: &str) -> Node {
        Node::from_json_str(json).unwrap()
    }

    fn apply(document: &str, patch: &str, strict: bool) -> Result<Node, PatchError> {
        let options = ApplyOptions::default().with_strict(strict);
        node(document).apply_patch_with(&Patch::from_json_str(patch).unwrap(), &options)
    }

    const ITEMS: &str = r#"{"items":[{"id":"1","v":1},{"id":"2","v":2}]}"#;

    #[test]
    fn locator_match_requires_every_field() {
        let pattern = node(r#"{"id":"2","v":2.0}"#);
        let Node::Object(pattern) = pattern else { unreachable!() };
        assert!(matches_locator(&node(r#"{"id":"2","v":2,"x":0}"#), &pattern));
        assert!(!matches_locator(&node(r#"{"id":"2"}"#), &pattern));
        assert!(!matches_locator(&node("[1]"), &pattern));
    }

    #[test]
    fn question_mark_resolves_to_matching_index() {
        let patched = apply(
            ITEMS,
            r#"[{"op":"replace","path":"/items/?/v","value":9,"value_locator":{"id":"2"}}]"#,
            true,
        )
        .unwrap();
        assert_eq!(patched, node(r#"{"items":[{"id":"1","v":1},{"id":"2","v":9}]}"#));
    }

    #[test]
    fn trailing_dash_with_locator_resolves() {
        let patched =
            apply(ITEMS, r#"[{"op":"remove","path":"/items/-","value_locator":{"id":"1"}}]"#, true).unwrap();
        assert_eq!(patched, node(r#"{"items":[{"id":"2","v":2}]}"#));
    }

    #[test]
    fn dash_second_to_last_with_locator_resolves() {
        let patched = apply(
            ITEMS,
            r#"[{"op":"remove","path":"/items/-/v","value_locator":{"id":"1"}}]"#,
            true,
        )
        .unwrap();
        assert_eq!(patched, node(r#"{"items":[{"id":"1"},{"id":"2","v":2}]}"#));
    }

    #[test]
    fn no_match_fails_in_strict_mode() {
        let err =
            apply(ITEMS, r#"[{"op":"remove","path":"/items/?","value_locator":{"id":"7"}}]"#, true).unwrap_err();
        assert_eq!(err, PatchError::LocatorNoMatch { path: "/items/?".parse().unwrap() });
    }

    #[test]
    fn no_match_skips_in_lenient_mode() {
        let patched = apply(
            ITEMS,
            concat!(
                r#"[{"op":"remove","path":"/items/?","value_locator":{"id":"7"}},"#,
                r#"{"op":"add","path":"/items/-","value":{"id":"3"}}]"#
            ),
            false,
        )
        .unwrap();
        assert_eq!(patched, node(r#"{"items":[{"id":"1","v":1},{"id":"2","v":2},{"id":"3"}]}"#));
    }

    #[test]
    fn missing_array_counts_as_no_match() {
        let patched =
            apply("{}", r#"[{"op":"remove","path":"/items/?","value_locator":{"id":"1"}}]"#, false).unwrap();
        assert_eq!(patched, node("{}"));
    }

    #[test]
    fn non_object_locator_fails_even_when_lenient() {
        let err = apply(ITEMS, r#"[{"op":"remove","path":"/items/?","value_locator":[1]}]"#, false).unwrap_err();
        assert_eq!(err, PatchError::LocatorNotObject { path: "/items/?".parse().unwrap() });
    }

    #[test]
    fn placeholder_must_be_near_the_end() {
        let err = apply(
            r#"{"a":[{"b":{"c":1}}]}"#,
            r#"[{"op":"remove","path":"/a/?/b/c","value_locator":{"x":1}}]"#,
            true,
        )
        .unwrap_err();
        assert_eq!(err, PatchError::PlaceholderPosition { path: "/a/?/b/c".parse().unwrap() });
    }

    #[test]
    fn bare_trailing_question_mark_targets_the_array() {
        let patched = apply(ITEMS, r#"[{"op":"replace","path":"/items/?","value":[]}]"#, true).unwrap();
        assert_eq!(patched, node(r#"{"items":[]}"#));
    }

    #[test]
    fn bare_inner_question_mark_is_rejected() {
        let err = apply(ITEMS, r#"[{"op":"replace","path":"/items/?/v","value":1}]"#, true).unwrap_err();
        assert_eq!(err, PatchError::PlaceholderPosition { path: "/items/?/v".parse().unwrap() });
    }

    #[test]
    fn add_at_located_index_still_suppresses_duplicates() {
        let patched = apply(
            ITEMS,
            r#"[{"op":"add","path":"/items/-","value":{"id":"1","v":1},"value_locator":{"id":"2"}}]"#,
            true,
        )
        .unwrap();
        assert_eq!(patched, node(ITEMS));
    }
}
