//! Built-in file formats

mod json;
mod toml;
mod xml;
mod yaml;

pub use self::json::JsonAdapter;
pub use self::toml::TomlAdapter;
pub use self::xml::XmlAdapter;
pub use self::yaml::YamlAdapter;
