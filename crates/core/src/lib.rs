//! nodeconf - A hierarchical configuration store with directive resolution
//!
//! This crate provides functionality to:
//! - Load JSON, YAML, TOML and XML sources into a dot-path addressable tree
//! - Merge sources with `combine`, `overwrite` or `preserve` semantics
//! - Resolve directives such as `${var}`, `@env(NAME)`, `#path`, `#{path}`,
//!   `@include(...)`, `@import` and `@extends` through a plugin pipeline
//! - Defer references until the whole tree is loaded, detecting cycles
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod merge;
pub mod parser;
pub mod path;
pub mod resolver;
pub mod resource;
pub mod store;
pub mod value;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use value::{Map, Value};

// Re-export main API components
pub use builder::ConfigBuilder;
pub use config::Config;
pub use context::Context;
pub use merge::MergeMode;
pub use parser::{Next, Outcome, ParseContext, Parser, Plugin};
pub use path::NodePath;
pub use resolver::Resolver;
pub use resource::{Adapter, AdapterManager, Resource, Source};
pub use store::Store;
