//! Fuzzing harnesses for `keypatch-core`.
//!
//! Each public function accepts raw bytes and drives one stage of the
//! pipeline: parsing, diffing, or patch application. Recoverable errors are
//! swallowed; invariants that must hold for every input are asserted.
//!
//! # Examples
//!
//! ```
//! keypatch_fuzz::fuzz_canonicalization(b"{\"a\":1}");
//! keypatch_fuzz::fuzz_diff(&[1, 2, 3, 4]);
//! keypatch_fuzz::fuzz_patch_apply(b"example");
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

use arbitrary::Unstructured;
use keypatch_core::{ApplyOptions, DiffOptions, Node, Patch, Pointer};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

const MAX_DEPTH: usize = 4;
const MAX_ARRAY_LEN: u8 = 6;
const MAX_OBJECT_LEN: u8 = 6;
const MAX_STRING_LEN: u8 = 12;
const KEY_FIELD: &str = "id";

/// Feeds arbitrary bytes through the JSON and YAML parsers and the patch
/// decoder.
///
/// ```
/// keypatch_fuzz::fuzz_canonicalization(b"{\"key\":\"value\"}");
/// ```
pub fn fuzz_canonicalization(data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(node) = Node::from_json_str(text) {
        if let Some(json) = node.to_json_value() {
            assert_eq!(Node::from_json_value(json).ok(), Some(node), "JSON value conversion must be lossless");
        }
    }
    let _ = Node::from_yaml_str(text);
    if let Ok(patch) = Patch::from_json_str(text) {
        let _ = patch.to_json_string();
    }
    let _ = text.parse::<Pointer>();
}

/// Diffs two random documents, optionally keying the root array by `id`, and
/// checks that a document diffed against itself yields an empty patch.
///
/// ```
/// keypatch_fuzz::fuzz_diff(b"seed");
/// ```
pub fn fuzz_diff(data: &[u8]) {
    let mut unstructured = Unstructured::new(data);
    let Some(options) = random_options(&mut unstructured) else {
        return;
    };
    let (Some(source), Some(target)) = (random_node(&mut unstructured), random_node(&mut unstructured)) else {
        return;
    };

    if let Ok(patch) = keypatch_core::diff(&source, &source, &options) {
        assert!(patch.is_empty(), "self diff must be empty");
    }
    if let Ok(patch) = keypatch_core::diff(&source, &target, &options) {
        let _ = keypatch_core::apply(&source, &patch);
        if let Ok(text) = patch.to_json_string() {
            assert!(Patch::from_json_str(&text).is_ok(), "emitted patch must decode");
        }
    }
}

/// Applies both a computed patch and a patch decoded from the raw bytes,
/// checking that the input document is never mutated.
///
/// ```
/// keypatch_fuzz::fuzz_patch_apply(b"patch fuzz");
/// ```
pub fn fuzz_patch_apply(data: &[u8]) {
    let mut unstructured = Unstructured::new(data);
    let strict = unstructured.arbitrary::<bool>().unwrap_or(true);
    let apply_options = ApplyOptions::default().with_strict(strict);

    if let (Some(base), Some(target)) = (random_node(&mut unstructured), random_node(&mut unstructured)) {
        if let Ok(patch) = keypatch_core::as_patch(&base, &target) {
            let before = base.clone();
            let _ = keypatch_core::apply_with(&base, &patch, &apply_options);
            assert_eq!(base, before, "apply must not mutate its input");
        }
    }

    if let Ok(patch) = serde_json::from_slice::<Patch>(data) {
        let mut unstructured = Unstructured::new(data);
        if let Some(seed) = random_node(&mut unstructured) {
            let before = seed.clone();
            let _ = keypatch_core::apply_with(&seed, &patch, &apply_options);
            assert_eq!(seed, before, "apply must not mutate its input");
        }
    }
}

fn random_options(unstructured: &mut Unstructured<'_>) -> Option<DiffOptions> {
    let keyed = unstructured.arbitrary::<bool>().ok()?;
    let locators = unstructured.arbitrary::<bool>().ok()?;
    let options = DiffOptions::default().with_locators(locators);
    if keyed {
        return options.with_key_field(Pointer::root(), Some(KEY_FIELD)).ok();
    }
    Some(options)
}

fn random_node(unstructured: &mut Unstructured<'_>) -> Option<Node> {
    let value = json_value_from_unstructured(unstructured, 0).ok()?;
    Node::from_json_value(value).ok()
}

fn json_value_from_unstructured(
    unstructured: &mut Unstructured<'_>,
    depth: usize,
) -> Result<JsonValue, arbitrary::Error> {
    if depth >= MAX_DEPTH {
        return json_leaf(unstructured);
    }

    match unstructured.int_in_range::<u8>(0..=6)? {
        0 => Ok(JsonValue::Null),
        1 => Ok(JsonValue::Bool(unstructured.arbitrary()?)),
        2 => Ok(JsonValue::Number(random_number(unstructured)?)),
        3 => Ok(JsonValue::String(random_string(unstructured)?)),
        4 => {
            let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_ARRAY_LEN)?);
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(json_value_from_unstructured(unstructured, depth + 1)?);
            }
            Ok(JsonValue::Array(items))
        }
        5 => {
            let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_OBJECT_LEN)?);
            let mut map = JsonMap::new();
            for _ in 0..len {
                let key = random_string(unstructured)?;
                let value = json_value_from_unstructured(unstructured, depth + 1)?;
                map.insert(key, value);
            }
            Ok(JsonValue::Object(map))
        }
        _ => random_record(unstructured, depth),
    }
}

/// An object carrying a short string `id`, so keyed diffs find matches.
fn random_record(unstructured: &mut Unstructured<'_>, depth: usize) -> Result<JsonValue, arbitrary::Error> {
    let mut map = JsonMap::new();
    let id = unstructured.int_in_range::<u8>(0..=3)?;
    map.insert(KEY_FIELD.to_owned(), JsonValue::String(id.to_string()));
    let len = usize::from(unstructured.int_in_range::<u8>(0..=2)?);
    for _ in 0..len {
        let key = random_string(unstructured)?;
        let value = json_value_from_unstructured(unstructured, depth + 1)?;
        map.insert(key, value);
    }
    Ok(JsonValue::Object(map))
}

fn json_leaf(unstructured: &mut Unstructured<'_>) -> Result<JsonValue, arbitrary::Error> {
    match unstructured.int_in_range::<u8>(0..=3)? {
        0 => Ok(JsonValue::Null),
        1 => Ok(JsonValue::Bool(unstructured.arbitrary()?)),
        2 => Ok(JsonValue::Number(random_number(unstructured)?)),
        _ => Ok(JsonValue::String(random_string(unstructured)?)),
    }
}

fn random_number(unstructured: &mut Unstructured<'_>) -> Result<JsonNumber, arbitrary::Error> {
    if unstructured.arbitrary()? {
        Ok(JsonNumber::from(unstructured.arbitrary::<i64>()?))
    } else {
        let numerator = f64::from(unstructured.arbitrary::<i32>()?);
        let denominator = f64::from(unstructured.int_in_range::<u16>(1..=1024)?);
        JsonNumber::from_f64(numerator / denominator).ok_or(arbitrary::Error::IncorrectFormat)
    }
}

fn random_string(unstructured: &mut Unstructured<'_>) -> Result<String, arbitrary::Error> {
    let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_STRING_LEN)?);
    let mut string = String::with_capacity(len);
    for _ in 0..len {
        let byte = unstructured.int_in_range::<u8>(0x20..=0x7e)?;
        string.push(char::from(byte));
    }
    Ok(string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_handles_utf8() {
        fuzz_canonicalization(br"{}");
        fuzz_canonicalization(br#"[{"op":"add","path":"/-","value":1}]"#);
        fuzz_canonicalization(&[0xff, 0xfe]);
    }

    #[test]
    fn diff_harness_runs() {
        fuzz_diff(b"diff");
        fuzz_diff(&[1, 0, 6, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn patch_harness_runs() {
        fuzz_patch_apply(b"patch");
        fuzz_patch_apply(br#"[{"op":"remove","path":"/0"}]"#);
    }
}
