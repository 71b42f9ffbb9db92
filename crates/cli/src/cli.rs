use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use nodeconf_core::Adapter;
use nodeconf_core::resource::adapters::{JsonAdapter, TomlAdapter, XmlAdapter, YamlAdapter};

use crate::commands::{convert_command, dump_command, get_command};

#[derive(Parser, Debug)]
#[command(name = "nodeconf")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the value at a dot path as JSON
    #[command(visible_alias = "g")]
    Get {
        /// Configuration file, glob pattern or `file#fragment`
        source: String,

        /// Dot path to read (the whole tree when omitted)
        path: Option<String>,

        /// Context variable for `${...}` directives (repeatable)
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Value printed when nothing exists at the path
        #[arg(short, long)]
        default: Option<String>,
    },
    /// Print the resolved tree in any supported format
    #[command(visible_alias = "d")]
    Dump {
        /// Configuration file, glob pattern or `file#fragment`
        source: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Context variable for `${...}` directives (repeatable)
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Print directives verbatim instead of resolving them
        #[arg(long)]
        raw: bool,
    },
    /// Resolve a source and write it out; the format follows the extension
    Convert {
        /// Source to read
        input: String,

        /// File to write
        output: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
    Xml,
}

impl Format {
    pub fn adapter(self) -> Box<dyn Adapter> {
        match self {
            Format::Json => Box::new(JsonAdapter),
            Format::Yaml => Box::new(YamlAdapter),
            Format::Toml => Box::new(TomlAdapter),
            Format::Xml => Box::new(XmlAdapter),
        }
    }
}

impl Commands {
    /// Execute the command
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Get {
                source,
                path,
                context,
                default,
            } => get_command(&source, path.as_deref(), &context, default.as_deref()),
            Commands::Dump {
                source,
                format,
                context,
                raw,
            } => dump_command(&source, format, &context, raw),
            Commands::Convert { input, output } => convert_command(&input, &output),
        }
    }
}
