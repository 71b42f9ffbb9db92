//! Dot-separated node paths
//!
//! A path like `services.api.timeout` addresses a node by walking map keys.
//! Empty segments are dropped, so `"a..b"` and `"a.b."` both mean `a.b` and
//! the empty string means the root.

use lru::LruCache;
use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// Separator between path segments
pub const SEPARATOR: char = '.';

/// Default number of memoized path splits per store
pub const DEFAULT_PATH_CACHE_SIZE: usize = 1000;

/// A path split into its segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Self {
        Self {
            segments: split(path),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, i.e. the key this path points at
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, key: impl Into<String>) -> NodePath {
        let mut segments = self.segments.clone();
        let key = key.into();
        if !key.is_empty() {
            segments.push(key);
        }
        Self { segments }
    }

    pub fn join(&self, other: &NodePath) -> NodePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True if one path is an ancestor of (or equal to) the other
    pub fn overlaps(&self, other: &NodePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        NodePath::parse(path)
    }
}

impl From<String> for NodePath {
    fn from(path: String) -> Self {
        NodePath::parse(&path)
    }
}

fn split(path: &str) -> Vec<String> {
    path.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Memoizes path splitting for hot lookups
pub struct PathCache {
    entries: RefCell<LruCache<String, Rc<[String]>>>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RefCell::new(LruCache::new(capacity)),
        }
    }

    /// Segments of `path`, served from the cache when possible
    pub fn segments(&self, path: &str) -> Rc<[String]> {
        let mut entries = self.entries.borrow_mut();
        if let Some(hit) = entries.get(path) {
            return Rc::clone(hit);
        }
        let segments: Rc<[String]> = split(path).into();
        entries.put(path.to_string(), Rc::clone(&segments));
        segments
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_SIZE)
    }
}

impl fmt::Debug for PathCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segments_are_filtered() {
        assert_eq!(NodePath::parse("a..b.").segments(), &["a", "b"]);
        assert!(NodePath::parse("").is_root());
        assert!(NodePath::parse("...").is_root());
    }

    #[test]
    fn test_parent_and_child() {
        let path = NodePath::parse("services.api.@extends");
        assert_eq!(path.key(), Some("@extends"));
        assert_eq!(path.parent().unwrap().to_string(), "services.api");
        assert_eq!(NodePath::root().child("x").to_string(), "x");
        assert!(NodePath::root().parent().is_none());
    }

    #[test]
    fn test_overlaps() {
        let a = NodePath::parse("app.defaults");
        assert!(a.overlaps(&NodePath::parse("app")));
        assert!(a.overlaps(&NodePath::parse("app.defaults.timeout")));
        assert!(!a.overlaps(&NodePath::parse("application")));
    }

    #[test]
    fn test_cache_memoizes_and_evicts() {
        let cache = PathCache::new(2);
        let first = cache.segments("a.b");
        let again = cache.segments("a.b");
        assert!(Rc::ptr_eq(&first, &again));

        cache.segments("c");
        cache.segments("d");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
