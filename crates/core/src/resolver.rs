//! Deferred values and post-parse fixups
//!
//! A [`Resolver`] is a lazy cell placed in the tree instead of a concrete
//! value. It is invoked with the [`Store`] by whoever reads it first, which
//! lets it see nodes that did not exist yet when the cell was created.
//!
//! A [`LazyQueue`] collects [`Fixup`]s produced while parsing (node
//! inheritance, mainly). The owner drains it once the parsed tree has been
//! absorbed into the store.

use crate::error::{Error, Result};
use crate::path::NodePath;
use crate::store::Store;
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Upper bound on cells returning cells before resolution gives up
pub const MAX_LAZY_CHAIN: usize = 64;

type ResolveFn = dyn Fn(&Store) -> Result<Value>;

enum State {
    Pending,
    Running,
    Done(Value),
}

struct Inner {
    label: String,
    resolve: Box<ResolveFn>,
    state: RefCell<State>,
}

/// A lazily computed value
///
/// The first successful [`invoke`](Resolver::invoke) memoizes the result,
/// so every clone of the cell observes the same value. A cell that is
/// invoked again while it is still computing reports
/// [`Error::CircularResolution`] instead of recursing forever.
#[derive(Clone)]
pub struct Resolver {
    inner: Rc<Inner>,
}

impl Resolver {
    pub fn new<F>(label: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Store) -> Result<Value> + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                label: label.into(),
                resolve: Box::new(resolve),
                state: RefCell::new(State::Pending),
            }),
        }
    }

    /// Human-readable description used in errors
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.inner.state.borrow(), State::Done(_))
    }

    /// Run the cell once. The result may itself be another lazy cell;
    /// use [`resolve_chain`] to unwrap completely.
    pub fn invoke(&self, store: &Store) -> Result<Value> {
        match &*self.inner.state.borrow() {
            State::Done(value) => return Ok(value.clone()),
            State::Running => return Err(Error::CircularResolution(self.inner.label.clone())),
            State::Pending => {}
        }

        self.inner.state.replace(State::Running);
        let result = (self.inner.resolve)(store);
        let next = match &result {
            Ok(value) => State::Done(value.clone()),
            Err(_) => State::Pending,
        };
        self.inner.state.replace(next);
        result
    }
}

impl PartialEq for Resolver {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.borrow() {
            State::Pending => "pending",
            State::Running => "running",
            State::Done(_) => "resolved",
        };
        f.debug_struct("Resolver")
            .field("label", &self.inner.label)
            .field("state", &state)
            .finish()
    }
}

/// Unwrap lazy cells until a concrete value appears
pub fn resolve_chain(value: Value, store: &Store) -> Result<Value> {
    let mut current = value;
    for _ in 0..MAX_LAZY_CHAIN {
        match current {
            Value::Lazy(cell) => current = cell.invoke(store)?,
            other => return Ok(other),
        }
    }
    match current {
        Value::Lazy(_) => Err(Error::LazyChainTooLong(MAX_LAZY_CHAIN)),
        other => Ok(other),
    }
}

/// Resolve `value` and every lazy cell nested inside it
pub fn materialize(value: Value, store: &Store) -> Result<Value> {
    Ok(match resolve_chain(value, store)? {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(key, value)| Ok((key, materialize(value, store)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| materialize(item, store))
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

type FixupFn = Box<dyn FnOnce(&mut Store) -> Result<()>>;

/// A deferred mutation of the store
pub struct Fixup {
    label: String,
    target: NodePath,
    depends_on: Vec<NodePath>,
    run: FixupFn,
}

impl Fixup {
    /// `target` is the node the fixup rewrites
    pub fn new<F>(label: impl Into<String>, target: NodePath, run: F) -> Self
    where
        F: FnOnce(&mut Store) -> Result<()> + 'static,
    {
        Self {
            label: label.into(),
            target,
            depends_on: Vec::new(),
            run: Box::new(run),
        }
    }

    /// Declare a node this fixup reads; pending fixups that rewrite it run first
    pub fn depends_on(mut self, path: NodePath) -> Self {
        self.depends_on.push(path);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> &NodePath {
        &self.target
    }
}

impl fmt::Debug for Fixup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixup")
            .field("label", &self.label)
            .field("target", &self.target)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// Ordered list of fixups collected during a parse
#[derive(Debug, Default)]
pub struct LazyQueue {
    pending: Vec<Fixup>,
}

impl LazyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fixup: Fixup) {
        debug!("Queueing fixup {} for {}", fixup.label, fixup.target);
        self.pending.push(fixup);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Run every queued fixup against `store`, emptying the queue.
    ///
    /// Fixups run in queue order, except that a fixup reading a node which
    /// another pending fixup rewrites waits for that one.
    pub fn drain(&mut self, store: &mut Store) -> Result<()> {
        let fixups = std::mem::take(&mut self.pending);
        if fixups.is_empty() {
            return Ok(());
        }
        debug!("Draining {} queued fixups", fixups.len());

        let mut drain = Drain::new(fixups);
        for index in 0..drain.len() {
            drain.run(index, store)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Progress {
    Pending,
    Running,
    Done,
}

struct Drain {
    targets: Vec<NodePath>,
    depends_on: Vec<Vec<NodePath>>,
    runs: Vec<Option<FixupFn>>,
    progress: Vec<Progress>,
}

impl Drain {
    fn new(fixups: Vec<Fixup>) -> Self {
        let mut drain = Self {
            targets: Vec::with_capacity(fixups.len()),
            depends_on: Vec::with_capacity(fixups.len()),
            runs: Vec::with_capacity(fixups.len()),
            progress: vec![Progress::Pending; fixups.len()],
        };
        for fixup in fixups {
            drain.targets.push(fixup.target);
            drain.depends_on.push(fixup.depends_on);
            drain.runs.push(Some(fixup.run));
        }
        drain
    }

    fn len(&self) -> usize {
        self.runs.len()
    }

    fn run(&mut self, index: usize, store: &mut Store) -> Result<()> {
        if self.progress[index] != Progress::Pending {
            return Ok(());
        }
        self.progress[index] = Progress::Running;

        for other in 0..self.len() {
            if other == index {
                continue;
            }
            let rewrites_dependency = self.depends_on[index]
                .iter()
                .any(|dependency| self.targets[other].overlaps(dependency));
            if !rewrites_dependency {
                continue;
            }
            match self.progress[other] {
                Progress::Done => {}
                Progress::Running => {
                    return Err(Error::CircularExtends(format!(
                        "{} and {}",
                        self.targets[index], self.targets[other]
                    )));
                }
                Progress::Pending => self.run(other, store)?,
            }
        }

        if let Some(run) = self.runs[index].take() {
            run(store)?;
        }
        self.progress[index] = Progress::Done;
        Ok(())
    }
}
