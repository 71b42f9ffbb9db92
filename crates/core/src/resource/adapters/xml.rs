use crate::error::{Error, Result};
use crate::resource::adapter::{Adapter, has_extension};
use crate::value::{Map, Value};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashSet;

/// Name of the document element written by [`XmlAdapter`]
pub const ROOT_ELEMENT: &str = "config";

/// `.xml` files
///
/// Elements map to keys, repeated siblings to sequences, text content to
/// strings and empty elements to null. Attributes are ignored. Everything
/// reads back as text, so numbers and booleans do not survive a round trip
/// with their types.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlAdapter;

fn decode_error(message: impl Into<String>) -> Error {
    Error::Decode {
        format: "xml",
        message: message.into(),
    }
}

fn encode_error(message: impl Into<String>) -> Error {
    Error::Encode {
        format: "xml",
        message: message.into(),
    }
}

#[derive(Default)]
struct Frame {
    name: String,
    children: Map,
    repeated: HashSet<String>,
    text: String,
}

impl Frame {
    fn open(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn attach(&mut self, name: String, value: Value) {
        if self.repeated.contains(&name) {
            if let Some(Value::Sequence(items)) = self.children.get_mut(&name) {
                items.push(value);
            }
            return;
        }
        match self.children.get_mut(&name) {
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::Sequence(vec![first, value]);
                self.repeated.insert(name);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn close(self) -> (String, Value) {
        let value = if !self.children.is_empty() {
            Value::Map(self.children)
        } else if !self.text.is_empty() {
            Value::String(self.text)
        } else {
            Value::Null
        };
        (self.name, value)
    }
}

fn element_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn decode(text: &str) -> Result<Value> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| decode_error(format!("{e} at byte {}", reader.error_position())))?;
        match event {
            Event::Start(start) => stack.push(Frame::open(element_name(start.name().as_ref()))),
            Event::Empty(start) => {
                let name = element_name(start.name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, Value::Null),
                    None => root = Some(Value::Null),
                }
            }
            Event::Text(content) => {
                if let Some(frame) = stack.last_mut() {
                    let unescaped = content.unescape().map_err(|e| decode_error(e.to_string()))?;
                    frame.text.push_str(&unescaped);
                }
            }
            Event::CData(content) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| decode_error("unexpected closing tag"))?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, value),
                    None => root = Some(value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(frame) = stack.last() {
        return Err(decode_error(format!("unclosed element <{}>", frame.name)));
    }
    Ok(match root {
        Some(Value::Null) | None => Value::empty_map(),
        Some(value) => value,
    })
}

/// Valid element name for a map key
///
/// Numeric keys become `item{n}`; other characters XML does not allow in
/// names become `_`.
pub fn sanitize_name(key: &str) -> String {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        return format!("item{key}");
    }

    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match name.chars().next() {
        None => name.push('_'),
        Some(first) if !(first.is_alphabetic() || first == '_') => name.insert(0, '_'),
        Some(_) => {}
    }
    name
}

type XmlWriter = Writer<Vec<u8>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| encode_error(e.to_string()))
}

fn write_element(writer: &mut XmlWriter, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => emit(writer, Event::Empty(BytesStart::new(name))),
        Value::Map(map) if map.is_empty() => emit(writer, Event::Empty(BytesStart::new(name))),
        Value::Map(map) => {
            emit(writer, Event::Start(BytesStart::new(name)))?;
            for (key, child) in map {
                write_entry(writer, &sanitize_name(key), child)?;
            }
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        Value::Sequence(items) => {
            emit(writer, Event::Start(BytesStart::new(name)))?;
            for item in items {
                write_element(writer, "item", item)?;
            }
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        Value::Lazy(cell) => Err(Error::UnresolvedLazy(cell.label().to_string())),
        scalar => {
            let text = scalar.interpolation_text().unwrap_or_default();
            emit(writer, Event::Start(BytesStart::new(name)))?;
            emit(writer, Event::Text(BytesText::new(&text)))?;
            emit(writer, Event::End(BytesEnd::new(name)))
        }
    }
}

/// Sequences under a key are written as repeated elements
fn write_entry(writer: &mut XmlWriter, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .try_for_each(|item| write_element(writer, name, item)),
        other => write_element(writer, name, other),
    }
}

impl Adapter for XmlAdapter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn supports(&self, uri: &str) -> bool {
        has_extension(uri, &["xml"])
    }

    fn decode(&self, text: &str) -> Result<Value> {
        decode(text)
    }

    fn encode(&self, tree: &Value) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_element(&mut writer, ROOT_ELEMENT, tree)?;

        let mut text = String::from_utf8(writer.into_inner()).map_err(|e| encode_error(e.to_string()))?;
        text.push('\n');
        Ok(text)
    }
}
