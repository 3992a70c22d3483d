use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Node, PointerError};

/// A single reference token within a [`Pointer`].
///
/// Tokens are classified from their raw text: `-` is [`Token::Append`], `?`
/// is [`Token::Locate`], a canonical non-negative integer is
/// [`Token::Index`] and anything else is [`Token::Key`]. When a token is
/// used against an object, its raw text is the field name.
///
/// ```
/// # use keypatch_core::Token;
/// assert_eq!(Token::from_raw("3"), Token::Index(3));
/// assert_eq!(Token::from_raw("03"), Token::Key("03".into()));
/// assert_eq!(Token::from_raw("-"), Token::Append);
/// assert_eq!(Token::from_raw("?").as_raw(), "?");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    /// Object field name.
    Key(String),
    /// Array index.
    Index(usize),
    /// `-`: one past the last array element.
    Append,
    /// `?`: position to be determined by a value locator.
    Locate,
}

impl Token {
    /// Classifies a raw (unescaped) token.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "-" => Self::Append,
            "?" => Self::Locate,
            _ if is_canonical_index(raw) => {
                raw.parse().map_or_else(|_| Self::Key(raw.to_owned()), Self::Index)
            }
            _ => Self::Key(raw.to_owned()),
        }
    }

    /// Creates a token for an object field.
    #[must_use]
    pub fn key<S>(value: S) -> Self
    where
        S: AsRef<str>,
    {
        Self::from_raw(value.as_ref())
    }

    /// Creates an index token.
    #[must_use]
    pub fn index(value: usize) -> Self {
        Self::Index(value)
    }

    /// Returns the raw, unescaped text of the token.
    #[must_use]
    pub fn as_raw(&self) -> Cow<'_, str> {
        match self {
            Self::Key(key) => Cow::Borrowed(key),
            Self::Index(index) => Cow::Owned(index.to_string()),
            Self::Append => Cow::Borrowed("-"),
            Self::Locate => Cow::Borrowed("?"),
        }
    }

    /// Returns the index when the token is one.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// Whether the token synthesizes an array when a missing path is created.
    #[must_use]
    pub fn is_array_like(&self) -> bool {
        matches!(self, Self::Index(_) | Self::Append)
    }
}

fn is_canonical_index(raw: &str) -> bool {
    !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw.len() == 1 || !raw.starts_with('0'))
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_raw())
    }
}

/// An RFC 6901 JSON Pointer extended with the `?` placeholder.
///
/// ```
/// # use keypatch_core::{Pointer, Token};
/// let pointer: Pointer = "/users/0/a~1b".parse()?;
/// assert_eq!(pointer.len(), 3);
/// assert_eq!(pointer.last(), Some(&Token::key("a/b")));
/// assert_eq!(pointer.to_string(), "/users/0/a~1b");
/// # Ok::<(), keypatch_core::PointerError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pointer(Vec<Token>);

impl Pointer {
    /// The pointer addressing the document root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Appends a token, returning the extended pointer.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.0.push(token);
        self
    }

    /// Appends an object field token.
    #[must_use]
    pub fn with_key<S>(self, key: S) -> Self
    where
        S: AsRef<str>,
    {
        self.with_token(Token::key(key))
    }

    /// Appends an index token.
    #[must_use]
    pub fn with_index(self, index: usize) -> Self {
        self.with_token(Token::Index(index))
    }

    /// Returns the tokens.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether the pointer addresses the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the last token, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    /// Returns the pointer without its last token, or `None` for the root.
    ///
    /// ```
    /// # use keypatch_core::Pointer;
    /// let pointer: Pointer = "/a/b".parse()?;
    /// assert_eq!(pointer.parent().unwrap().to_string(), "/a");
    /// assert!(Pointer::root().parent().is_none());
    /// # Ok::<(), keypatch_core::PointerError>(())
    /// ```
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Returns the first `len` tokens as a new pointer.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Pushes a token in place.
    pub fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    /// Pops the last token.
    pub fn pop(&mut self) -> Option<Token> {
        self.0.pop()
    }

    /// Consumes the pointer and returns the owned tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.0
    }

    /// Whether any token is the `?` placeholder.
    #[must_use]
    pub fn has_placeholder(&self) -> bool {
        self.0.contains(&Token::Locate)
    }

    /// Looks up the value this pointer addresses.
    ///
    /// ```
    /// # use keypatch_core::{Node, Pointer};
    /// let doc = Node::from_json_str(r#"{"a":[10,20]}"#)?;
    /// let pointer: Pointer = "/a/1".parse()?;
    /// assert_eq!(pointer.resolve(&doc), Some(&Node::from(20_i64)));
    /// assert!("/a/-".parse::<Pointer>()?.resolve(&doc).is_none());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn resolve<'a>(&self, node: &'a Node) -> Option<&'a Node> {
        self.0.iter().try_fold(node, |current, token| match current {
            Node::Object(map) => map.get(token.as_raw().as_ref()),
            Node::Array(items) => token.as_index().and_then(|index| items.get(index)),
            _ => None,
        })
    }

    /// Mutable counterpart of [`Pointer::resolve`].
    pub fn resolve_mut<'a>(&self, node: &'a mut Node) -> Option<&'a mut Node> {
        self.0.iter().try_fold(node, |current, token| match current {
            Node::Object(map) => map.get_mut(token.as_raw().as_ref()),
            Node::Array(items) => token.as_index().and_then(move |index| items.get_mut(index)),
            _ => None,
        })
    }
}

impl From<Vec<Token>> for Pointer {
    fn from(value: Vec<Token>) -> Self {
        Self(value)
    }
}

impl From<Token> for Pointer {
    fn from(value: Token) -> Self {
        Self(vec![value])
    }
}

impl FromStr for Pointer {
    type Err = PointerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash { pointer: input.to_owned() });
        };
        rest.split('/')
            .map(|raw| {
                unescape(raw)
                    .map(|token| Token::from_raw(&token))
                    .ok_or_else(|| PointerError::InvalidEscape { pointer: input.to_owned() })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

fn unescape(raw: &str) -> Option<String> {
    if !raw.contains('~') {
        return Some(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

fn escape(raw: &str) -> Cow<'_, str> {
    if raw.contains(['~', '/']) {
        Cow::Owned(raw.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(raw)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            f.write_str("/")?;
            f.write_str(&escape(&token.as_raw()))?;
        }
        Ok(())
    }
}

impl Serialize for Pointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Cow::<'de, str>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a Pointer {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
