use super::{PatchBuilder, Pointer};
use crate::Node;

/// Handles the cases where at least one side is empty (`null`, `[]` or `{}`).
///
/// Returns `true` when the difference has been fully recorded. Empty
/// containers of the same kind as a non-empty counterpart are left to the
/// object and array procedures.
pub(super) fn diff_emptiness(
    builder: &mut PatchBuilder,
    source: &Node,
    target: &Node,
    pointer: &Pointer,
) -> bool {
    let same_kind = source.kind() == target.kind();
    match (source.is_empty_value(), target.is_empty_value()) {
        (true, true) => true,
        (true, false) if !same_kind => {
            builder.value_added(pointer.clone(), target.clone());
            true
        }
        (false, true) if !same_kind => {
            diff_primitives(builder, source, target, pointer);
            true
        }
        _ => false,
    }
}

/// Produces a replacement for values that are not recursed into.
pub(super) fn diff_primitives(builder: &mut PatchBuilder, source: &Node, target: &Node, pointer: &Pointer) {
    builder.value_replaced(pointer.clone(), source.clone(), target.clone());
}
