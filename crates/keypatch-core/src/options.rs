use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{OptionsError, Pointer, Token};

/// Default bound on document nesting for both diff and apply.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration passed to the differ.
///
/// The key-field map names, per array pointer, the field that identifies
/// "the same" element across source and target. A pointer mapped to `None`
/// explicitly selects value-identity reconciliation.
///
/// ```
/// # use keypatch_core::DiffOptions;
/// let opts = DiffOptions::default()
///     .with_key_field("/users".parse()?, Some("id"))?
///     .with_key_field("/tags".parse()?, None::<&str>)?;
/// assert_eq!(opts.key_field(&"/users".parse()?), Some("id"));
/// assert_eq!(opts.key_field(&"/tags".parse()?), None);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDiffOptions")]
pub struct DiffOptions {
    key_fields: BTreeMap<Pointer, Option<String>>,
    emit_locators: bool,
    max_depth: usize,
}

/// Unvalidated wire form of [`DiffOptions`].
#[derive(Deserialize)]
struct RawDiffOptions {
    #[serde(default)]
    key_fields: BTreeMap<Pointer, Option<String>>,
    #[serde(default)]
    emit_locators: bool,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

impl TryFrom<RawDiffOptions> for DiffOptions {
    type Error = OptionsError;

    fn try_from(raw: RawDiffOptions) -> Result<Self, Self::Error> {
        Self::default()
            .with_key_fields(raw.key_fields)?
            .with_locators(raw.emit_locators)
            .with_max_depth(raw.max_depth)
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_strict() -> bool {
    true
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { key_fields: BTreeMap::new(), emit_locators: false, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl DiffOptions {
    /// Returns the configured key field for the array at `pointer`.
    #[must_use]
    pub fn key_field(&self, pointer: &Pointer) -> Option<&str> {
        self.key_fields.get(pointer).and_then(|key| key.as_deref())
    }

    /// Returns the full key-field map.
    #[must_use]
    pub fn key_fields(&self) -> &BTreeMap<Pointer, Option<String>> {
        &self.key_fields
    }

    /// Whether keyed operations are addressed through value locators.
    #[must_use]
    pub fn emit_locators(&self) -> bool {
        self.emit_locators
    }

    /// Returns the recursion limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Configures the key field for the array at `pointer`.
    ///
    /// ```
    /// # use keypatch_core::{DiffOptions, OptionsError};
    /// let err = DiffOptions::default().with_key_field("/a".parse()?, Some(" ")).unwrap_err();
    /// assert!(matches!(err, OptionsError::EmptyKeyField { .. }));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn with_key_field<S>(mut self, pointer: Pointer, key: Option<S>) -> Result<Self, OptionsError>
    where
        S: Into<String>,
    {
        if pointer.tokens().iter().any(|token| matches!(token, Token::Append | Token::Locate)) {
            return Err(OptionsError::AmbiguousKeyPointer { pointer });
        }
        let key = key.map(Into::into);
        if key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(OptionsError::EmptyKeyField { pointer });
        }
        self.key_fields.insert(pointer, key);
        Ok(self)
    }

    /// Configures several key fields at once.
    pub fn with_key_fields<I, S>(self, entries: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (Pointer, Option<S>)>,
        S: Into<String>,
    {
        entries.into_iter().try_fold(self, |options, (pointer, key)| options.with_key_field(pointer, key))
    }

    /// Addresses keyed array operations through `?` placeholders and value
    /// locators instead of concrete indices.
    #[must_use]
    pub fn with_locators(mut self, enabled: bool) -> Self {
        self.emit_locators = enabled;
        self
    }

    /// Sets the recursion limit.
    pub fn with_max_depth(mut self, depth: usize) -> Result<Self, OptionsError> {
        if depth == 0 {
            return Err(OptionsError::ZeroDepth);
        }
        self.max_depth = depth;
        Ok(self)
    }
}

/// Configuration passed to the apply engine.
///
/// ```
/// # use keypatch_core::ApplyOptions;
/// assert!(ApplyOptions::default().strict());
/// assert!(!ApplyOptions::lenient().strict());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawApplyOptions")]
pub struct ApplyOptions {
    strict: bool,
    max_depth: usize,
}

#[derive(Deserialize)]
struct RawApplyOptions {
    #[serde(default = "default_strict")]
    strict: bool,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

impl TryFrom<RawApplyOptions> for ApplyOptions {
    type Error = OptionsError;

    fn try_from(raw: RawApplyOptions) -> Result<Self, Self::Error> {
        Self::default().with_strict(raw.strict).with_max_depth(raw.max_depth)
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { strict: true, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl ApplyOptions {
    /// Options that skip operations whose value locator matches nothing.
    #[must_use]
    pub fn lenient() -> Self {
        Self::default().with_strict(false)
    }

    /// Whether an unmatched value locator aborts the whole apply.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Returns the maximum accepted path length.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the maximum accepted path length.
    pub fn with_max_depth(mut self, depth: usize) -> Result<Self, OptionsError> {
        if depth == 0 {
            return Err(OptionsError::ZeroDepth);
        }
        self.max_depth = depth;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(text: &str) -> Pointer {
        text.parse().unwrap()
    }

    #[test]
    fn key_pointers_must_be_concrete() {
        let err = DiffOptions::default().with_key_field(pointer("/a/-"), Some("id")).unwrap_err();
        assert_eq!(err, OptionsError::AmbiguousKeyPointer { pointer: pointer("/a/-") });
    }

    #[test]
    fn explicit_none_is_recorded() {
        let opts = DiffOptions::default().with_key_field(pointer("/a"), None::<String>).unwrap();
        assert_eq!(opts.key_fields().get(&pointer("/a")), Some(&None));
        assert_eq!(opts.key_field(&pointer("/a")), None);
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert_eq!(DiffOptions::default().with_max_depth(0).unwrap_err(), OptionsError::ZeroDepth);
        assert_eq!(ApplyOptions::default().with_max_depth(0).unwrap_err(), OptionsError::ZeroDepth);
    }

    #[test]
    fn options_deserialize_from_json() {
        let opts: DiffOptions =
            serde_json::from_str(r#"{"key_fields":{"/users":"id","/tags":null}}"#).unwrap();
        assert_eq!(opts.key_field(&pointer("/users")), Some("id"));
        assert_eq!(opts.max_depth(), DEFAULT_MAX_DEPTH);
        assert!(!opts.emit_locators());
    }

    #[test]
    fn deserialized_options_are_validated() {
        for json in [
            r#"{"key_fields":{"/a/-":"id"}}"#,
            r#"{"key_fields":{"/a/?":null}}"#,
            r#"{"key_fields":{"/a":""}}"#,
            r#"{"max_depth":0}"#,
        ] {
            assert!(serde_json::from_str::<DiffOptions>(json).is_err(), "{json} should be rejected");
        }
        let err = serde_json::from_str::<DiffOptions>(r#"{"key_fields":{"/a":" "}}"#).unwrap_err();
        assert!(err.to_string().contains("must be a non-empty string"), "{err}");
    }

    #[test]
    fn apply_options_deserialize_with_defaults_and_validation() {
        let opts: ApplyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, ApplyOptions::default());
        let opts: ApplyOptions = serde_json::from_str(r#"{"strict":false,"max_depth":8}"#).unwrap();
        assert!(!opts.strict());
        assert_eq!(opts.max_depth(), 8);
        assert!(serde_json::from_str::<ApplyOptions>(r#"{"max_depth":0}"#).is_err());
    }
}
