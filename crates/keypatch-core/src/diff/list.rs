use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::object::has_reserved_field;
use super::{Differ, Pointer, Token};
use crate::patch::matches_locator;
use crate::{DiffError, Node};

impl Differ<'_> {
    pub(super) fn diff_arrays(
        &mut self,
        source: &[Node],
        target: &[Node],
        pointer: &Pointer,
    ) -> Result<(), DiffError> {
        if source.is_empty() {
            self.append_all(target, pointer);
            return Ok(());
        }
        if target.is_empty() {
            for (index, element) in source.iter().enumerate() {
                self.builder.array_value_removed(pointer, index, element.clone(), None);
            }
            return Ok(());
        }

        match self.options.key_field(pointer) {
            Some(key) => {
                debug!(pointer = %pointer, strategy = "key", key, "reconciling array");
                self.diff_by_key(source, target, pointer, key)
            }
            None => {
                debug!(pointer = %pointer, strategy = "value", "reconciling array");
                self.diff_by_value(source, target, pointer);
                Ok(())
            }
        }
    }

    fn append_all<'n>(&mut self, elements: impl IntoIterator<Item = &'n Node>, pointer: &Pointer) {
        let append = pointer.clone().with_token(Token::Append);
        for element in elements {
            self.builder.value_added(append.clone(), element.clone());
        }
    }

    /// Multiset reconciliation: a source element survives when an equal
    /// target element is still unclaimed.
    fn diff_by_value(&mut self, source: &[Node], target: &[Node], pointer: &Pointer) {
        let mut unclaimed: Vec<Option<&Node>> = target.iter().map(Some).collect();
        let mut kept = Vec::with_capacity(source.len());

        for (index, element) in source.iter().enumerate() {
            let claimed =
                unclaimed.iter_mut().find(|slot| matches!(slot, Some(candidate) if *candidate == element));
            if let Some(slot) = claimed {
                *slot = None;
                kept.push(element);
                continue;
            }
            let locator = self.value_locator(element, &kept);
            self.builder.array_value_removed(pointer, index, element.clone(), locator);
        }

        self.append_all(unclaimed.into_iter().flatten(), pointer);
    }

    /// Uses the whole element as its locator when it is an object that no
    /// surviving earlier element also matches.
    fn value_locator(&self, element: &Node, kept: &[&Node]) -> Option<Node> {
        if !self.options.emit_locators() {
            return None;
        }
        let fields = element.as_object()?;
        if kept.iter().any(|other| matches_locator(other, fields)) {
            return None;
        }
        Some(element.clone())
    }

    fn diff_by_key(
        &mut self,
        source: &[Node],
        target: &[Node],
        pointer: &Pointer,
        key: &str,
    ) -> Result<(), DiffError> {
        let target_keys = key_values(target, pointer, key)?;
        let source_keys = key_values(source, pointer, key)?;

        // Each key pairs its first source element with its first target
        // element. Later duplicates on either side stay unmatched.
        let mut unclaimed = BTreeMap::new();
        for (index, value) in target_keys.iter().enumerate() {
            unclaimed.entry(*value).or_insert(index);
        }

        let mut claimed = BTreeSet::new();
        let mut matched_keys = BTreeSet::new();
        for (index, (element, value)) in source.iter().zip(&source_keys).enumerate() {
            // Once a key has matched, its locator would find the kept element.
            let locator = (self.options.emit_locators() && !matched_keys.contains(value))
                .then(|| key_locator(key, value));
            let Some(other) = unclaimed.remove(value) else {
                self.builder.array_value_removed(pointer, index, element.clone(), locator);
                continue;
            };
            claimed.insert(other);
            matched_keys.insert(*value);
            let counterpart = &target[other];
            if element != counterpart {
                self.diff_matched(element, counterpart, pointer, index, locator);
            }
        }

        let unmatched = target.iter().enumerate().filter(|(index, _)| !claimed.contains(index));
        self.append_all(unmatched.map(|(_, element)| element), pointer);
        Ok(())
    }

    /// Compares the top-level fields of two matched elements.
    fn diff_matched(
        &mut self,
        source: &Node,
        target: &Node,
        pointer: &Pointer,
        index: usize,
        locator: Option<Node>,
    ) {
        let (Node::Object(source), Node::Object(target)) = (source, target) else {
            return;
        };
        if has_reserved_field(source) || has_reserved_field(target) {
            let (from, to) = (Node::Object(source.clone()), Node::Object(target.clone()));
            self.builder.array_element_replaced(pointer, index, from, to, locator);
            return;
        }

        for (field, value) in source.iter().filter(|(field, _)| !target.contains_key(*field)) {
            self.builder.array_field_removed(pointer, index, field, value.clone(), locator.clone());
        }
        for (field, value) in target.iter().filter(|(field, _)| !source.contains_key(*field)) {
            self.builder.array_value_replaced(
                pointer,
                index,
                field,
                Node::Void,
                value.clone(),
                locator.clone(),
            );
        }
        for (field, value) in source {
            if let Some(other) = target.get(field).filter(|other| *other != value) {
                self.builder.array_value_replaced(
                    pointer,
                    index,
                    field,
                    value.clone(),
                    other.clone(),
                    locator.clone(),
                );
            }
        }
    }
}

/// Reads the key field of every element, which must be a string.
fn key_values<'n>(elements: &'n [Node], pointer: &Pointer, key: &str) -> Result<Vec<&'n str>, DiffError> {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            element.as_object().and_then(|fields| fields.get(key)).and_then(Node::as_str).ok_or_else(|| {
                DiffError::KeyFieldMissing { pointer: pointer.clone(), index, key: key.to_owned() }
            })
        })
        .collect()
}

fn key_locator(key: &str, value: &str) -> Node {
    Node::Object(BTreeMap::from([(key.to_owned(), Node::from(value))]))
}

#[cfg(test)]
mod tests {
    use crate::diff::diff_nodes;
    use crate::{DiffError, DiffOptions, Node, Patch, Pointer};

    fn node(json: &str) -> Node {
        Node::from_json_str(json).unwrap()
    }

    fn keyed(pointer: &str, key: &str) -> DiffOptions {
        DiffOptions::default().with_key_field(pointer.parse::<Pointer>().unwrap(), Some(key)).unwrap()
    }

    fn wire(source: &str, target: &str, options: &DiffOptions) -> String {
        diff_nodes(&node(source), &node(target), options).unwrap().to_json_string().unwrap()
    }

    fn paths(patch: &Patch) -> Vec<String> {
        patch.iter().map(|op| format!("{} {}", op.kind(), op.path())).collect()
    }

    #[test]
    fn value_strategy_ignores_order() {
        let patch = diff_nodes(&node("[1,2,3]"), &node("[3,1,2]"), &DiffOptions::default()).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn value_strategy_removes_unmatched_and_appends_leftovers() {
        let patch = diff_nodes(&node("[1,2,3,4]"), &node("[4,5,1]"), &DiffOptions::default()).unwrap();
        assert_eq!(paths(&patch), ["remove /1", "remove /1", "add /-"]);
        assert_eq!(patch.operations()[1].original_value(), Some(&node("3")));
    }

    #[test]
    fn whole_array_appended_and_removed() {
        assert_eq!(
            wire("[]", "[1,2]", &DiffOptions::default()),
            r#"[{"op":"add","path":"/-","value":1},{"op":"add","path":"/-","value":2}]"#
        );
        assert_eq!(
            wire("[1,2]", "[]", &DiffOptions::default()),
            r#"[{"op":"remove","path":"/0","value":1},{"op":"remove","path":"/0","value":2}]"#
        );
    }

    #[test]
    fn key_strategy_matches_by_field() {
        let options = keyed("", "id");
        assert_eq!(
            wire(
                r#"[{"id":"1","v":1},{"id":"2","v":2}]"#,
                r#"[{"id":"2","v":9},{"id":"3","v":3}]"#,
                &options
            ),
            concat!(
                r#"[{"op":"remove","path":"/0","value":{"id":"1","v":1}},"#,
                r#"{"op":"replace","path":"/0/v","value":9,"original_value":2},"#,
                r#"{"op":"add","path":"/-","value":{"id":"3","v":3}}]"#
            )
        );
    }

    #[test]
    fn key_strategy_reports_field_level_changes() {
        let options = keyed("/users", "name");
        assert_eq!(
            wire(
                r#"{"users":[{"name":"ann","age":30,"nick":"a"}]}"#,
                r#"{"users":[{"name":"ann","age":31,"mail":"a@x"}]}"#,
                &options
            ),
            concat!(
                r#"[{"op":"remove","path":"/users/0/nick","value":"a"},"#,
                r#"{"op":"replace","path":"/users/0/mail","value":"a@x"},"#,
                r#"{"op":"replace","path":"/users/0/age","value":31,"original_value":30}]"#
            )
        );
    }

    #[test]
    fn key_strategy_does_not_recurse_into_fields() {
        let options = keyed("", "id");
        assert_eq!(
            wire(r#"[{"id":"a","x":{"p":1,"q":1}}]"#, r#"[{"id":"a","x":{"p":1,"q":2}}]"#, &options),
            r#"[{"op":"replace","path":"/0/x","value":{"p":1,"q":2},"original_value":{"p":1,"q":1}}]"#
        );
    }

    #[test]
    fn key_strategy_with_locators() {
        let options = keyed("/items", "id").with_locators(true);
        assert_eq!(
            wire(
                r#"{"items":[{"id":"1"},{"id":"2","v":2}]}"#,
                r#"{"items":[{"id":"2","v":9}]}"#,
                &options
            ),
            concat!(
                r#"[{"op":"remove","path":"/items/?","value":{"id":"1"},"value_locator":{"id":"1"}},"#,
                r#"{"op":"replace","path":"/items/?/v","value":9,"original_value":2,"value_locator":{"id":"2"}}]"#
            )
        );
    }

    #[test]
    fn keyed_element_with_reserved_field_is_replaced_whole() {
        let options = keyed("", "id");
        let source = node(r#"[{"id":"a","?":1},{"id":"b"}]"#);
        let target = node(r#"[{"id":"a","?":2},{"id":"b"}]"#);
        let patch = diff_nodes(&source, &target, &options).unwrap();
        assert_eq!(
            patch.to_json_string().unwrap(),
            r#"[{"op":"replace","path":"/0","value":{"?":2,"id":"a"},"original_value":{"?":1,"id":"a"}}]"#
        );
        assert_eq!(source.apply_patch(&patch).unwrap(), target);

        let located = diff_nodes(&source, &target, &options.with_locators(true)).unwrap();
        assert_eq!(paths(&located), ["replace /?"]);
        assert_eq!(source.apply_patch(&located).unwrap(), target);
    }

    #[test]
    fn duplicate_source_keys_remove_later_elements_by_index() {
        let source = node(r#"[{"id":"a","v":1},{"id":"a","v":2},{"id":"b"}]"#);
        let target = node(r#"[{"id":"a","v":1},{"id":"b"}]"#);
        for options in [keyed("", "id"), keyed("", "id").with_locators(true)] {
            let patch = diff_nodes(&source, &target, &options).unwrap();
            assert_eq!(paths(&patch), ["remove /1"]);
            assert_eq!(patch.operations()[0].value_locator(), None);
            assert_eq!(source.apply_patch(&patch).unwrap(), target);
        }
    }

    #[test]
    fn duplicate_target_keys_are_appended() {
        let options = keyed("", "id");
        assert_eq!(
            wire(r#"[{"id":"a"}]"#, r#"[{"id":"a"},{"id":"a","v":2}]"#, &options),
            r#"[{"op":"add","path":"/-","value":{"id":"a","v":2}}]"#
        );
    }

    #[test]
    fn unmatched_duplicate_keys_are_all_located() {
        let options = keyed("", "id").with_locators(true);
        let source = node(r#"[{"id":"a","v":1},{"id":"a","v":2}]"#);
        let target = node(r#"[{"id":"b"}]"#);
        let patch = diff_nodes(&source, &target, &options).unwrap();
        assert_eq!(paths(&patch), ["remove /?", "remove /?", "add /-"]);
        assert_eq!(source.apply_patch(&patch).unwrap(), target);
    }

    #[test]
    fn missing_key_field_aborts() {
        let options = keyed("", "id");
        let err = diff_nodes(&node(r#"[{"id":"1"}]"#), &node(r#"[{"id":"1"},{"v":2}]"#), &options)
            .unwrap_err();
        match err {
            DiffError::KeyFieldMissing { pointer, index, key } => {
                assert!(pointer.is_empty());
                assert_eq!(index, 1);
                assert_eq!(key, "id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn numeric_key_values_are_rejected() {
        let options = keyed("", "id");
        let err = diff_nodes(&node(r#"[{"id":1}]"#), &node(r#"[{"id":2}]"#), &options).unwrap_err();
        assert!(matches!(err, DiffError::KeyFieldMissing { index: 0, .. }));
    }

    #[test]
    fn explicit_value_identity_overrides_nothing() {
        let options = DiffOptions::default().with_key_field(Pointer::root(), None::<&str>).unwrap();
        let patch = diff_nodes(&node(r#"[{"v":1}]"#), &node(r#"[{"v":2}]"#), &options).unwrap();
        assert_eq!(paths(&patch), ["remove /0", "add /-"]);
    }

    #[test]
    fn value_locator_is_skipped_when_ambiguous() {
        let options = DiffOptions::default().with_locators(true);
        let patch = diff_nodes(
            &node(r#"[{"a":1,"b":2},{"a":1},{"c":3}]"#),
            &node(r#"[{"a":1,"b":2}]"#),
            &options,
        )
        .unwrap();
        assert_eq!(paths(&patch), ["remove /1", "remove /?"]);
        assert_eq!(patch.operations()[1].value_locator(), Some(&node(r#"{"c":3}"#)));
    }
}
