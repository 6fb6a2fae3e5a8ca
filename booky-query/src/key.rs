//! Structural query keys.
//!
//! A `QueryKey` is an ordered list of primitive segments, the first of
//! which names the resource (`["book-detail", 42]`). Two keys are equal when
//! their segments are equal, no matter where they were built. Invalidation
//! and removal match by prefix, so `["loans"]` covers `["loans", 2, "active"]`.

use std::fmt;

/// One primitive component of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for KeySegment {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for KeySegment {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeySegment {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl<T> From<Option<T>> for KeySegment
where
    T: Into<KeySegment>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Identifies one cached result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Vec<KeySegment>,
}

impl QueryKey {
    /// Start a key with its resource name.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            segments: vec![KeySegment::Str(resource.into())],
        }
    }

    /// Build a key from raw segments.
    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        Self { segments }
    }

    /// Append a parameter segment.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// The resource name, if the first segment is a string.
    pub fn resource(&self) -> Option<&str> {
        match self.segments.first() {
            Some(KeySegment::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix`'s segments equal the first segments of this key.
    ///
    /// The empty key is a prefix of every key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        f.write_str("]")
    }
}

impl From<&str> for QueryKey {
    fn from(resource: &str) -> Self {
        Self::new(resource)
    }
}

/// Build a [`QueryKey`] from a list of segments.
///
/// ```
/// use booky_query::query_key;
///
/// let key = query_key!["book-detail", 42i64];
/// assert_eq!(key.to_string(), "[\"book-detail\", 42]");
/// ```
#[macro_export]
macro_rules! query_key {
    ($($segment:expr),* $(,)?) => {
        $crate::QueryKey::from_segments(vec![$($crate::KeySegment::from($segment)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = QueryKey::new("book-detail").with(42i64);
        let b = query_key!["book-detail", 42i64];
        assert_eq!(a, b);
        assert_ne!(a, query_key!["book-detail", "42"]);
    }

    #[test]
    fn test_prefix_matching() {
        let key = query_key!["loans", 2u32, "active"];
        assert!(key.starts_with(&query_key!["loans"]));
        assert!(key.starts_with(&query_key!["loans", 2u32]));
        assert!(key.starts_with(&key.clone()));
        assert!(!key.starts_with(&query_key!["loans", 3u32]));
        assert!(!query_key!["loans"].starts_with(&key));
        assert!(key.starts_with(&QueryKey::from_segments(vec![])));
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(query_key!["reviews", 1u32].resource(), Some("reviews"));
        assert_eq!(QueryKey::from_segments(vec![KeySegment::Int(1)]).resource(), None);
    }

    #[test]
    fn test_option_segment() {
        let none: Option<&str> = None;
        assert_eq!(KeySegment::from(none), KeySegment::Null);
        assert_eq!(KeySegment::from(Some("q")), KeySegment::Str("q".to_string()));
    }
}
