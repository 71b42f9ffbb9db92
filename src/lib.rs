//! Facade over [`nodeconf_core`]
//!
//! ```no_run
//! use nodeconf::{Config, MergeMode};
//!
//! # fn main() -> nodeconf::Result<()> {
//! let mut config = Config::new();
//! config.load("config/app.yaml")?;
//! config.import("config/local.json", MergeMode::Overwrite)?;
//! let port = config.get_or("server.port", 8080i64)?;
//! # Ok(())
//! # }
//! ```
pub use nodeconf_core::*;
