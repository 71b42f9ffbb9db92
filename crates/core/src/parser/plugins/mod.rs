//! Built-in directives
//!
//! | Directive | Plugin | Priority |
//! |---|---|---|
//! | `--key` | [`CommentPlugin`] | 1000 |
//! | `@env(NAME)` | [`EnvPlugin`] | 999 |
//! | `${name\|default}` | [`ContextPlugin`] | 998 |
//! | `@include(source)` | [`IncludePlugin`] | 997 |
//! | `@import[:mode]` | [`ImportPlugin`] | 996 |
//! | `@extends` | [`ExtendsPlugin`] | 995 |
//! | `#path\|default` | [`ReferenceNodePlugin`] | 994 |
//! | `#{path\|default}` | [`ReferenceValuePlugin`] | 993 |

mod comment;
mod context;
mod env;
mod extends;
mod import;
mod include;
mod reference;

pub use comment::{COMMENT_PREFIX, CommentPlugin};
pub use context::{ContextPlugin, MAX_INTERPOLATION_PASSES};
pub use env::EnvPlugin;
pub use extends::{EXTENDS_KEY, ExtendsPlugin};
pub use import::{IMPORT_KEY, ImportPlugin};
pub use include::IncludePlugin;
pub use reference::{ReferenceNodePlugin, ReferenceValuePlugin};

use super::Parser;

pub const COMMENT_PRIORITY: i32 = 1000;
pub const ENV_PRIORITY: i32 = 999;
pub const CONTEXT_PRIORITY: i32 = 998;
pub const INCLUDE_PRIORITY: i32 = 997;
pub const IMPORT_PRIORITY: i32 = 996;
pub const EXTENDS_PRIORITY: i32 = 995;
pub const REFERENCE_NODE_PRIORITY: i32 = 994;
pub const REFERENCE_VALUE_PRIORITY: i32 = 993;

pub(crate) fn register_defaults(parser: &mut Parser) {
    parser
        .register(CommentPlugin, COMMENT_PRIORITY)
        .register(EnvPlugin, ENV_PRIORITY)
        .register(ContextPlugin, CONTEXT_PRIORITY)
        .register(IncludePlugin, INCLUDE_PRIORITY)
        .register(ImportPlugin, IMPORT_PRIORITY)
        .register(ExtendsPlugin, EXTENDS_PRIORITY)
        .register(ReferenceNodePlugin, REFERENCE_NODE_PRIORITY)
        .register(ReferenceValuePlugin, REFERENCE_VALUE_PRIORITY);
}
