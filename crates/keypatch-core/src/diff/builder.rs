use std::collections::BTreeMap;

use super::{Operation, Patch, Pointer, Token};
use crate::Node;

/// Accumulates operations emitted by the differ into an ordered [`Patch`].
///
/// Array-specific recorders take the element's index in the *source* array.
/// The builder remembers which source elements of each array were removed
/// and addresses later operations on that array by the position the element
/// will occupy once the earlier removals have been applied.
///
/// ```
/// # use keypatch_core::{diff::PatchBuilder, Node, Pointer};
/// let array: Pointer = "/items".parse()?;
/// let mut builder = PatchBuilder::new();
/// builder.array_value_removed(&array, 0, Node::from(1_i64), None);
/// builder.array_value_removed(&array, 1, Node::from(2_i64), None);
/// let patch = builder.into_patch();
/// let paths: Vec<String> = patch.iter().map(|op| op.path().to_string()).collect();
/// assert_eq!(paths, ["/items/0", "/items/0"]);
/// # Ok::<(), keypatch_core::PointerError>(())
/// ```
#[derive(Debug, Default)]
pub struct PatchBuilder {
    operations: Vec<Operation>,
    removed: BTreeMap<Pointer, Vec<usize>>,
}

impl PatchBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `value` appears at `path` in the target only.
    pub fn value_added(&mut self, path: Pointer, value: Node) {
        self.operations.push(Operation::add(path, value));
    }

    /// Records that `value` at `path` is absent from the target.
    pub fn value_removed(&mut self, path: Pointer, value: Node) {
        self.operations.push(Operation::remove(path, value));
    }

    /// Records that the value at `path` changes from `from` to `to`.
    pub fn value_replaced(&mut self, path: Pointer, from: Node, to: Node) {
        self.operations.push(Operation::replace(path, from, to));
    }

    /// Records the removal of the element at `source_index` of `array`.
    ///
    /// With a locator the element is addressed as `array/?`.
    pub fn array_value_removed(
        &mut self,
        array: &Pointer,
        source_index: usize,
        value: Node,
        locator: Option<Node>,
    ) {
        let path = self.element_path(array, source_index, locator.is_some());
        self.push_located(Operation::remove(path, value), locator);
        let removed = self.removed.entry(array.clone()).or_default();
        let at = removed.partition_point(|&index| index < source_index);
        removed.insert(at, source_index);
    }

    /// Records that `field` of the element at `source_index` changes.
    ///
    /// `from` is `Void` when the field is new on the element.
    pub fn array_value_replaced(
        &mut self,
        array: &Pointer,
        source_index: usize,
        field: &str,
        from: Node,
        to: Node,
        locator: Option<Node>,
    ) {
        let path = self.element_path(array, source_index, locator.is_some()).with_key(field);
        self.push_located(Operation::replace(path, from, to), locator);
    }

    /// Records that the whole element at `source_index` changes.
    pub fn array_element_replaced(
        &mut self,
        array: &Pointer,
        source_index: usize,
        from: Node,
        to: Node,
        locator: Option<Node>,
    ) {
        let path = self.element_path(array, source_index, locator.is_some());
        self.push_located(Operation::replace(path, from, to), locator);
    }

    /// Records that `field` of the element at `source_index` disappears.
    pub fn array_field_removed(
        &mut self,
        array: &Pointer,
        source_index: usize,
        field: &str,
        value: Node,
        locator: Option<Node>,
    ) {
        let path = self.element_path(array, source_index, locator.is_some()).with_key(field);
        self.push_located(Operation::remove(path, value), locator);
    }

    /// Number of operations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Finishes the patch.
    #[must_use]
    pub fn into_patch(self) -> Patch {
        Patch::from_operations(self.operations)
    }

    /// The index the element at `source_index` has once every earlier
    /// recorded removal from `array` has been applied.
    #[must_use]
    pub fn current_index(&self, array: &Pointer, source_index: usize) -> usize {
        let shifted = self
            .removed
            .get(array)
            .map_or(0, |removed| removed.partition_point(|&index| index < source_index));
        source_index - shifted
    }

    fn element_path(&self, array: &Pointer, source_index: usize, located: bool) -> Pointer {
        let token =
            if located { Token::Locate } else { Token::Index(self.current_index(array, source_index)) };
        array.clone().with_token(token)
    }

    fn push_located(&mut self, operation: Operation, locator: Option<Node>) {
        let operation = match locator {
            Some(locator) => operation.with_locator(locator),
            None => operation,
        };
        self.operations.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(text: &str) -> Pointer {
        text.parse().unwrap()
    }

    #[test]
    fn replace_after_removal_addresses_shifted_element() {
        let array = pointer("/list");
        let mut builder = PatchBuilder::new();
        builder.array_value_removed(&array, 0, Node::Null, None);
        builder.array_value_replaced(&array, 1, "v", Node::from(2_i64), Node::from(9_i64), None);
        let patch = builder.into_patch();
        assert_eq!(patch.operations()[1].path(), &pointer("/list/0/v"));
    }

    #[test]
    fn removals_in_other_arrays_do_not_shift() {
        let mut builder = PatchBuilder::new();
        builder.array_value_removed(&pointer("/a"), 0, Node::Null, None);
        assert_eq!(builder.current_index(&pointer("/b"), 3), 3);
        assert_eq!(builder.current_index(&pointer("/a"), 3), 2);
        assert_eq!(builder.current_index(&pointer("/a"), 0), 0);
    }

    #[test]
    fn element_replace_addresses_the_element() {
        let array = pointer("/list");
        let mut builder = PatchBuilder::new();
        builder.array_value_removed(&array, 1, Node::Null, None);
        builder.array_element_replaced(&array, 2, Node::from(1_i64), Node::from(2_i64), None);
        let patch = builder.into_patch();
        assert_eq!(patch.operations()[1].path(), &pointer("/list/1"));
    }

    #[test]
    fn located_operations_use_placeholder() {
        let locator = Node::from_json_str(r#"{"id":"7"}"#).unwrap();
        let mut builder = PatchBuilder::new();
        builder.array_field_removed(&pointer("/a"), 4, "gone", Node::Bool(true), Some(locator.clone()));
        let patch = builder.into_patch();
        let op = &patch.operations()[0];
        assert_eq!(op.path(), &pointer("/a/?/gone"));
        assert_eq!(op.value_locator(), Some(&locator));
    }
}
