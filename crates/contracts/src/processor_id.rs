//! ProcessorId - name of a registered processor type
//!
//! The name doubles as the output directory under `<output_path>/processors/`,
//! so it is kept as the exact string the processor registered with.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Processor type identifier.
///
/// Backed by `Arc<str>`: every bucket, batch and task carries one, and
/// cloning only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::ProcessorId;
///
/// let id: ProcessorId = "TextProcessor".into();
/// assert_eq!(id, "TextProcessor");
/// assert_eq!(id.as_str(), "TextProcessor");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(Arc<str>);

impl ProcessorId {
    /// Create a new ProcessorId from a string slice.
    #[inline]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ProcessorId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ProcessorId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProcessorId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessorId {
    #[inline]
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProcessorId {
    #[inline]
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessorId({:?})", self.0)
    }
}

impl PartialEq<str> for ProcessorId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ProcessorId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for ProcessorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProcessorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_shares_storage() {
        let a: ProcessorId = "TextProcessor".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut capacities: HashMap<ProcessorId, u64> = HashMap::new();
        capacities.insert("TextProcessor".into(), 100);
        assert_eq!(capacities.get("TextProcessor"), Some(&100));
        assert_eq!(capacities.get("UrlProcessor"), None);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id: ProcessorId = "UrlProcessor".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"UrlProcessor\"");
        let back: ProcessorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
