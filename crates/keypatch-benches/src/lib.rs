//! Benchmark corpora for `keypatch-core`.
//!
//! Each corpus is generated deterministically, so benchmarks need no
//! fixture files and results are comparable across runs.
//!
//! # Examples
//!
//! ```
//! let corpus = keypatch_benches::available_corpora()
//!     .iter()
//!     .find(|corpus| corpus.name() == "keyed-records")
//!     .expect("registered corpus");
//! let dataset = corpus.load()?;
//! let patch = dataset.diff()?;
//! assert!(!patch.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

use keypatch_core::{
    CanonicalizeError, DiffError, DiffOptions, Node, OptionsError, Patch, Pointer, PointerError,
};
use serde_json::{json, Value as JsonValue};

const RECORDS: usize = 500;
const TAGS: usize = 1_000;
const NESTED_WIDTH: usize = 8;
const NESTED_DEPTH: usize = 4;

/// Errors raised while building a dataset.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// A generated document was rejected by the parser.
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
    /// A key pointer failed to parse.
    #[error(transparent)]
    Pointer(#[from] PointerError),
    /// The corpus options were rejected.
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// A named, generated pair of documents.
#[derive(Clone, Copy, Debug)]
pub struct Corpus {
    name: &'static str,
    description: &'static str,
    generate: fn() -> (JsonValue, JsonValue),
    key: Option<(&'static str, &'static str)>,
}

impl Corpus {
    /// Short identifier used as the benchmark id.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// One-line description of the document shape.
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Serialized size of both documents in bytes.
    #[must_use]
    pub fn fixture_bytes(&self) -> usize {
        let (before, after) = (self.generate)();
        before.to_string().len() + after.to_string().len()
    }

    /// Builds the documents and diff options for this corpus.
    pub fn load(&self) -> Result<Dataset, CorpusError> {
        let (before, after) = (self.generate)();
        let mut options = DiffOptions::default();
        if let Some((pointer, field)) = self.key {
            let pointer = pointer.parse::<Pointer>()?;
            options = options.with_key_field(pointer, Some(field))?;
        }
        Ok(Dataset {
            before: Node::from_json_value(before)?,
            after: Node::from_json_value(after)?,
            options,
        })
    }
}

/// A loaded corpus ready to be diffed.
#[derive(Clone, Debug)]
pub struct Dataset {
    before: Node,
    after: Node,
    options: DiffOptions,
}

impl Dataset {
    /// The source document.
    #[must_use]
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// The target document.
    #[must_use]
    pub fn after(&self) -> &Node {
        &self.after
    }

    /// Diff options configured for the corpus.
    #[must_use]
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Computes the patch from `before` to `after`.
    pub fn diff(&self) -> Result<Patch, DiffError> {
        keypatch_core::diff(&self.before, &self.after, &self.options)
    }
}

/// Returns every registered corpus.
#[must_use]
pub fn available_corpora() -> &'static [Corpus] {
    const CORPORA: &[Corpus] = &[
        Corpus {
            name: "keyed-records",
            description: "user records reconciled by id with edits, removals and additions",
            generate: keyed_records,
            key: Some(("/users", "id")),
        },
        Corpus {
            name: "value-tags",
            description: "a large array of scalars reconciled by value",
            generate: value_tags,
            key: None,
        },
        Corpus {
            name: "nested-objects",
            description: "a wide, deep object tree with scattered leaf changes",
            generate: nested_objects,
            key: None,
        },
    ];
    CORPORA
}

fn keyed_records() -> (JsonValue, JsonValue) {
    let user = |id: usize, age: usize| json!({"id": format!("u{id}"), "name": format!("user {id}"), "age": age});
    let before: Vec<_> = (0..RECORDS).map(|id| user(id, 20 + id % 50)).collect();
    let after: Vec<_> = (0..RECORDS)
        .rev()
        .filter(|id| id % 10 != 3)
        .map(|id| user(id, if id % 7 == 0 { 99 } else { 20 + id % 50 }))
        .chain((RECORDS..RECORDS + RECORDS / 20).map(|id| user(id, 30)))
        .collect();
    (json!({"users": before}), json!({"users": after}))
}

fn value_tags() -> (JsonValue, JsonValue) {
    let before: Vec<_> = (0..TAGS).map(|n| json!(format!("tag-{n}"))).collect();
    let after: Vec<_> = (0..TAGS).filter(|n| n % 9 != 0).map(|n| json!(format!("tag-{}", n + n % 4))).collect();
    (JsonValue::Array(before), JsonValue::Array(after))
}

fn nested_objects() -> (JsonValue, JsonValue) {
    (tree(NESTED_DEPTH, 0), tree(NESTED_DEPTH, 1))
}

fn tree(depth: usize, salt: usize) -> JsonValue {
    if depth == 0 {
        return json!(salt);
    }
    let fields = (0..NESTED_WIDTH)
        .map(|n| {
            let child_salt = if n == depth { salt } else { 0 };
            (format!("k{n}"), tree(depth - 1, child_salt))
        })
        .collect();
    JsonValue::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpora_have_unique_names() {
        let mut names: Vec<_> = available_corpora().iter().map(Corpus::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), available_corpora().len());
    }

    #[test]
    fn every_corpus_diffs_and_applies() {
        for corpus in available_corpora() {
            let dataset = corpus.load().unwrap();
            let patch = dataset.diff().unwrap();
            assert!(!patch.is_empty(), "{} should produce changes", corpus.name());
            keypatch_core::apply(dataset.before(), &patch).unwrap();
            assert!(corpus.fixture_bytes() > 0);
        }
    }
}
