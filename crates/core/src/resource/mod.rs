//! Turning sources into trees
//!
//! A [`Resource`] reads files through the [`AdapterManager`], resolves
//! relative paths against the file currently being read, expands glob
//! patterns, narrows results to `#fragment` subtrees and refuses to read a
//! file that is already being read further up the chain.

pub mod adapter;
pub mod adapters;

pub use adapter::{Adapter, AdapterManager};

use crate::error::{Error, Result};
use crate::merge::{MergeMode, merge_values};
use crate::parser::ParseContext;
use crate::path::NodePath;
use crate::value::Value;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Something a tree can be read from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// An in-memory tree
    Tree(Value),
    /// A file path or glob pattern, optionally followed by `#fragment`
    Uri(String),
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Source::Tree(value)
    }
}

impl From<&str> for Source {
    fn from(uri: &str) -> Self {
        Source::Uri(uri.to_string())
    }
}

impl From<String> for Source {
    fn from(uri: String) -> Self {
        Source::Uri(uri)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Uri(path.display().to_string())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Uri(path.display().to_string())
    }
}

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Split `path#fragment`; the location must not be empty
fn split_uri(uri: &str) -> Result<(&str, Option<&str>)> {
    let (location, fragment) = match uri.split_once('#') {
        Some((location, fragment)) => (location.trim(), Some(fragment.trim())),
        None => (uri.trim(), None),
    };
    if location.is_empty() {
        return Err(Error::EmptySource);
    }
    Ok((location, fragment.filter(|fragment| !fragment.is_empty())))
}

fn select(tree: Value, location: &str, fragment: Option<&str>) -> Result<Value> {
    let Some(fragment) = fragment else {
        return Ok(tree);
    };
    tree.at(&NodePath::parse(fragment))
        .cloned()
        .ok_or_else(|| Error::FragmentNotFound {
            uri: location.to_string(),
            fragment: fragment.to_string(),
        })
}

/// Files matching `pattern` in sorted order
fn glob_files(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    matches.sort();

    if matches.is_empty() {
        warn!("Glob pattern {} matched no files", pattern);
    } else {
        debug!("Glob pattern {} matched {} files", pattern, matches.len());
    }
    Ok(matches)
}

/// A file on the source stack; popped again on drop, errors included
struct SourceScope<'r> {
    stack: &'r RefCell<Vec<PathBuf>>,
    path: PathBuf,
}

impl Drop for SourceScope<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
        debug!("Finished source {}", self.path.display());
    }
}

/// Reads and writes configuration sources
pub struct Resource {
    adapters: AdapterManager,
    stack: RefCell<Vec<PathBuf>>,
    base_dir: Option<PathBuf>,
}

impl Resource {
    /// A resource with the built-in adapters
    pub fn new() -> Self {
        Self::with_adapters(AdapterManager::with_defaults())
    }

    pub fn with_adapters(adapters: AdapterManager) -> Self {
        Self {
            adapters,
            stack: RefCell::new(Vec::new()),
            base_dir: None,
        }
    }

    pub fn adapters(&self) -> &AdapterManager {
        &self.adapters
    }

    pub fn adapters_mut(&mut self) -> &mut AdapterManager {
        &mut self.adapters
    }

    /// Directory relative sources resolve against outside of any file
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = Some(dir.into());
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Files currently being read, outermost first
    pub fn stack(&self) -> Vec<PathBuf> {
        self.stack.borrow().clone()
    }

    /// Read `source` into a tree, running the parser over it when `parse` is set
    pub fn read(&self, source: Source, parse: bool, cx: &mut ParseContext<'_>) -> Result<Value> {
        match source {
            Source::Tree(mut tree) => {
                if parse {
                    let parser = cx.parser;
                    parser.parse(&mut tree, cx)?;
                }
                Ok(tree)
            }
            Source::Uri(uri) => self.read_uri(&uri, parse, cx),
        }
    }

    /// Read `source` file by file, handing each raw tree to `within` while
    /// its file is still on the source stack
    ///
    /// Whatever `within` reads resolves relative paths against that file and
    /// counts as nested inside it. The fragment is selected before `within`
    /// runs; the trees of a glob are combined in sorted file order.
    pub fn read_each<F>(&self, source: Source, cx: &mut ParseContext<'_>, mut within: F) -> Result<Value>
    where
        F: FnMut(Value, &mut ParseContext<'_>) -> Result<Value>,
    {
        let uri = match source {
            Source::Tree(tree) => return within(tree, cx),
            Source::Uri(uri) => uri,
        };
        let (location, fragment) = split_uri(&uri)?;
        let resolved = self.resolve(location);

        let mut visit = |path: &Path, cx: &mut ParseContext<'_>| -> Result<Value> {
            let scope = self.enter(path)?;
            let tree = select(self.decode(&scope.path)?, location, fragment)?;
            within(tree, cx)
        };

        if !is_glob(location) {
            return visit(&resolved, cx);
        }
        let mut combined = Value::empty_map();
        for path in glob_files(&resolved)? {
            let tree = visit(&path, cx)?;
            merge_values(&mut combined, tree, MergeMode::Combine);
        }
        Ok(combined)
    }

    fn read_uri(&self, uri: &str, parse: bool, cx: &mut ParseContext<'_>) -> Result<Value> {
        let (location, fragment) = split_uri(uri)?;
        let resolved = self.resolve(location);
        let tree = if is_glob(location) {
            self.read_glob(&resolved, parse, cx)?
        } else {
            self.read_file(&resolved, parse, cx)?
        };
        select(tree, location, fragment)
    }

    /// Absolute form of `location`
    ///
    /// Relative paths are taken from the directory of the file being read,
    /// else the base directory, else the working directory.
    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            return path.to_path_buf();
        }

        let current = self
            .stack
            .borrow()
            .last()
            .and_then(|file| file.parent().map(Path::to_path_buf));
        let base = current
            .or_else(|| self.base_dir.clone())
            .or_else(|| std::env::current_dir().ok());
        match base {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    fn read_glob(&self, pattern: &Path, parse: bool, cx: &mut ParseContext<'_>) -> Result<Value> {
        let mut combined = Value::empty_map();
        for path in glob_files(pattern)? {
            let tree = self.read_file(&path, parse, cx)?;
            merge_values(&mut combined, tree, MergeMode::Combine);
        }
        Ok(combined)
    }

    fn read_file(&self, path: &Path, parse: bool, cx: &mut ParseContext<'_>) -> Result<Value> {
        let scope = self.enter(path)?;
        let mut tree = self.decode(&scope.path)?;
        if parse {
            let parser = cx.parser;
            parser.parse(&mut tree, cx)?;
        }
        Ok(tree)
    }

    /// Push `path` on the source stack until the returned scope drops
    fn enter(&self, path: &Path) -> Result<SourceScope<'_>> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let mut stack = self.stack.borrow_mut();
        if stack.contains(&path) {
            let chain = stack
                .iter()
                .chain(std::iter::once(&path))
                .map(|entry| entry.display().to_string())
                .collect();
            return Err(Error::CircularReference {
                uri: path.display().to_string(),
                chain,
            });
        }

        debug!("Reading source {}", path.display());
        stack.push(path.clone());
        Ok(SourceScope {
            stack: &self.stack,
            path,
        })
    }

    fn decode(&self, path: &Path) -> Result<Value> {
        let uri = path.display().to_string();
        let adapter = self.adapters.adapter(&uri)?;
        adapter
            .read(path)
            .map_err(|cause| Error::in_source(uri, cause))
    }

    /// Encode `tree` with the adapter for `target` and write it out
    pub fn write(&self, target: &Path, tree: &Value) -> Result<()> {
        let uri = target.display().to_string();
        let adapter = self.adapters.adapter(&uri)?;
        debug!("Writing {} with the {} adapter", uri, adapter.name());
        adapter.write(target, tree)
    }
}

impl Clone for Resource {
    /// Copies the configuration; the copy starts with an empty source stack
    fn clone(&self) -> Self {
        Self {
            adapters: self.adapters.clone(),
            stack: RefCell::new(Vec::new()),
            base_dir: self.base_dir.clone(),
        }
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("adapters", &self.adapters)
            .field("stack", &self.stack.borrow())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}
