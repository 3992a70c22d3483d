use std::collections::BTreeMap;

use super::{Differ, Pointer, Token};
use crate::{DiffError, Node};

impl Differ<'_> {
    /// Diffs two objects: fields only in the source, then fields only in the
    /// target, then common fields, each in sorted field order.
    pub(super) fn diff_objects(
        &mut self,
        source: &BTreeMap<String, Node>,
        target: &BTreeMap<String, Node>,
        pointer: &Pointer,
    ) -> Result<(), DiffError> {
        // Fields named `-` or `?` read as placeholders when applied.
        if has_reserved_field(source) || has_reserved_field(target) {
            let (from, to) = (Node::Object(source.clone()), Node::Object(target.clone()));
            self.builder.value_replaced(pointer.clone(), from, to);
            return Ok(());
        }

        for (field, value) in source.iter().filter(|(field, _)| !target.contains_key(*field)) {
            self.field_removed(pointer.clone().with_key(field), value);
        }

        for (field, value) in target.iter().filter(|(field, _)| !source.contains_key(*field)) {
            self.field_added(pointer.clone().with_key(field), value);
        }

        for (field, value) in source {
            if let Some(other) = target.get(field) {
                self.diff_node(value, other, &pointer.clone().with_key(field))?;
            }
        }
        Ok(())
    }

    fn field_removed(&mut self, path: Pointer, value: &Node) {
        match value {
            Node::Array(items) if !items.is_empty() => {
                for (index, item) in items.iter().enumerate() {
                    self.builder.array_value_removed(&path, index, item.clone(), None);
                }
                self.builder.value_removed(path, Node::Array(Vec::new()));
            }
            _ => self.builder.value_removed(path, value.clone()),
        }
    }

    fn field_added(&mut self, path: Pointer, value: &Node) {
        match value {
            Node::Array(items) if !items.is_empty() => {
                let append = path.with_token(Token::Append);
                for item in items {
                    self.builder.value_added(append.clone(), item.clone());
                }
            }
            // Numeric or reserved child names would synthesize arrays or
            // trigger locator resolution, so such objects are added whole.
            Node::Object(fields)
                if !fields.is_empty() && fields.keys().all(|key| matches!(Token::key(key), Token::Key(_))) =>
            {
                for (key, child) in fields {
                    self.builder.value_added(path.clone().with_key(key), child.clone());
                }
            }
            _ => self.builder.value_added(path, value.clone()),
        }
    }
}

/// Whether any field name would parse as the append or locate token.
pub(super) fn has_reserved_field(fields: &BTreeMap<String, Node>) -> bool {
    fields.keys().any(|field| matches!(Token::key(field), Token::Append | Token::Locate))
}

#[cfg(test)]
mod tests {
    use crate::diff::diff_nodes;
    use crate::{DiffOptions, Node, Patch};

    fn diff(source: &str, target: &str) -> Patch {
        diff_nodes(
            &Node::from_json_str(source).unwrap(),
            &Node::from_json_str(target).unwrap(),
            &DiffOptions::default(),
        )
        .unwrap()
    }

    fn wire(patch: &Patch) -> String {
        patch.to_json_string().unwrap()
    }

    #[test]
    fn fields_are_removed_then_added_then_recursed() {
        let patch = diff(r#"{"b":1,"c":{"x":1},"z":0}"#, r#"{"a":2,"c":{"x":2},"y":0}"#);
        assert_eq!(
            wire(&patch),
            concat!(
                r#"[{"op":"remove","path":"/b","value":1},"#,
                r#"{"op":"remove","path":"/z","value":0},"#,
                r#"{"op":"add","path":"/a","value":2},"#,
                r#"{"op":"add","path":"/y","value":0},"#,
                r#"{"op":"replace","path":"/c/x","value":2,"original_value":1}]"#
            )
        );
    }

    #[test]
    fn vanished_array_field_is_emptied_then_removed() {
        let patch = diff(r#"{"tags":["a","b"]}"#, "{}");
        assert_eq!(
            wire(&patch),
            concat!(
                r#"[{"op":"remove","path":"/tags/0","value":"a"},"#,
                r#"{"op":"remove","path":"/tags/0","value":"b"},"#,
                r#"{"op":"remove","path":"/tags","value":[]}]"#
            )
        );
    }

    #[test]
    fn new_array_field_is_appended_per_element() {
        let patch = diff("{}", r#"{"tags":["a","b"]}"#);
        assert_eq!(
            wire(&patch),
            concat!(
                r#"[{"op":"add","path":"/tags/-","value":"a"},"#,
                r#"{"op":"add","path":"/tags/-","value":"b"}]"#
            )
        );
    }

    #[test]
    fn new_object_field_is_added_per_child() {
        let patch = diff("{}", r#"{"meta":{"k":1,"l":[2]}}"#);
        assert_eq!(
            wire(&patch),
            concat!(
                r#"[{"op":"add","path":"/meta/k","value":1},"#,
                r#"{"op":"add","path":"/meta/l","value":[2]}]"#
            )
        );
    }

    #[test]
    fn new_object_field_with_numeric_children_is_added_whole() {
        let patch = diff("{}", r#"{"meta":{"0":"zero"}}"#);
        assert_eq!(wire(&patch), r#"[{"op":"add","path":"/meta","value":{"0":"zero"}}]"#);
    }

    #[test]
    fn object_with_locate_field_is_replaced_whole() {
        let source = Node::from_json_str(r#"{"cfg":{"?":1,"keep":true}}"#).unwrap();
        let target = Node::from_json_str(r#"{"cfg":{"?":2,"keep":true}}"#).unwrap();
        let patch = diff_nodes(&source, &target, &DiffOptions::default()).unwrap();
        assert_eq!(
            wire(&patch),
            r#"[{"op":"replace","path":"/cfg","value":{"?":2,"keep":true},"original_value":{"?":1,"keep":true}}]"#
        );
        assert_eq!(source.apply_patch(&patch).unwrap(), target);
    }

    #[test]
    fn object_gaining_append_field_is_replaced_whole() {
        let source = Node::from_json_str("{}").unwrap();
        let target = Node::from_json_str(r#"{"-":5}"#).unwrap();
        let patch = diff_nodes(&source, &target, &DiffOptions::default()).unwrap();
        assert_eq!(wire(&patch), r#"[{"op":"replace","path":"","value":{"-":5},"original_value":{}}]"#);
        assert_eq!(source.apply_patch(&patch).unwrap(), target);
    }

    #[test]
    fn object_losing_append_field_is_replaced_whole() {
        let patch = diff(r#"{"a":{"-":[1],"b":1}}"#, r#"{"a":{"b":1}}"#);
        assert_eq!(
            wire(&patch),
            r#"[{"op":"replace","path":"/a","value":{"b":1},"original_value":{"-":[1],"b":1}}]"#
        );
    }

    #[test]
    fn empty_source_field_gains_whole_value() {
        let patch = diff(r#"{"a":null}"#, r#"{"a":[1,2]}"#);
        assert_eq!(wire(&patch), r#"[{"op":"add","path":"/a","value":[1,2]}]"#);
    }

    #[test]
    fn non_empty_field_becoming_empty_is_replaced() {
        let patch = diff(r#"{"a":"x"}"#, r#"{"a":{}}"#);
        assert_eq!(wire(&patch), r#"[{"op":"replace","path":"/a","value":{},"original_value":"x"}]"#);
    }
}
