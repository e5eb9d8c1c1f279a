//! Minimal XML handling for prompt artifacts.
//!
//! Streaming checks and rewrites on top of `quick-xml`: well-formedness
//! with a single root, appending child elements under a named block, and
//! pulling the text of the first element with a given name.

use std::fmt::Display;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{FactoryError, Result};

fn malformed(reason: impl Display) -> FactoryError {
    FactoryError::invalid(format!("malformed XML: {}", reason))
}

fn reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(true);
    reader
}

fn name_of(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Check that `xml` is well-formed and return the root element's name
pub fn root_element(xml: &str) -> Result<String> {
    let mut reader = reader(xml);
    let mut depth = 0usize;
    let mut root: Option<String> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                check_element(&e)?;
                if depth == 0 {
                    if root.is_some() {
                        return Err(malformed("junk after document element"));
                    }
                    root = Some(name_of(&e));
                }
                depth += 1;
            }
            Event::Empty(e) => {
                check_element(&e)?;
                if depth == 0 {
                    if root.is_some() {
                        return Err(malformed("junk after document element"));
                    }
                    root = Some(name_of(&e));
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("closing tag without opening tag"))?;
            }
            Event::Text(t) => {
                t.unescape().map_err(malformed)?;
                let raw: &[u8] = &t;
                if depth == 0 && !raw.iter().all(u8::is_ascii_whitespace) {
                    return Err(malformed("text outside the root element"));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(malformed("CDATA outside the root element"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(malformed("unclosed element at end of document"));
    }

    root.ok_or_else(|| malformed("no element found"))
}

/// XML name: starts with a letter, `_` or `:`, then letters, digits, `-`, `.`, `_` or `:`
fn is_valid_name(name: &[u8]) -> bool {
    let Ok(name) = std::str::from_utf8(name) else {
        return false;
    };

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':'))
}

/// Element and attribute names must be valid XML names
fn check_element(start: &BytesStart<'_>) -> Result<()> {
    if !is_valid_name(start.name().as_ref()) {
        return Err(malformed(format!("invalid element name '{}'", name_of(start))));
    }

    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        if !is_valid_name(attr.key.as_ref()) {
            return Err(malformed(format!(
                "invalid attribute name '{}'",
                String::from_utf8_lossy(attr.key.as_ref())
            )));
        }
    }
    Ok(())
}

/// Whether the root element has a direct child named `child`
fn has_root_child(xml: &str, child: &str) -> Result<bool> {
    let mut reader = reader(xml);
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                if depth == 1 && e.name().as_ref() == child.as_bytes() {
                    return Ok(true);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && e.name().as_ref() == child.as_bytes() {
                    return Ok(true);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Ok(false),
            _ => {}
        }
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: &Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| FactoryError::invalid(format!("failed to write XML: {}", e)))
}

fn write_entries(writer: &mut Writer<Vec<u8>>, entries: &[(&str, String)]) -> Result<()> {
    for (name, value) in entries {
        write(writer, &Event::Start(BytesStart::new(*name)))?;
        write(writer, &Event::Text(BytesText::new(value)))?;
        write(writer, &Event::End(BytesEnd::new(*name)))?;
    }
    Ok(())
}

/// Append `entries` as text elements inside the root's `block` child.
///
/// The first direct child named `block` is reused; without one, a new
/// block is added as the root's last child. Everything else is copied
/// through unchanged.
pub fn append_to_block(xml: &str, block: &str, entries: &[(&str, String)]) -> Result<String> {
    root_element(xml)?;
    let has_block = has_root_child(xml, block)?;

    let mut reader = reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut done = false;

    loop {
        let event = reader.read_event().map_err(malformed)?;

        match &event {
            Event::Eof => break,
            Event::Start(_) => {
                depth += 1;
                write(&mut writer, &event)?;
            }
            // <root/>: expand so the block has somewhere to go
            Event::Empty(e) if depth == 0 && !done => {
                let root = name_of(e);
                write(&mut writer, &Event::Start(e.clone()))?;
                write(&mut writer, &Event::Start(BytesStart::new(block)))?;
                write_entries(&mut writer, entries)?;
                write(&mut writer, &Event::End(BytesEnd::new(block)))?;
                write(&mut writer, &Event::End(BytesEnd::new(root)))?;
                done = true;
            }
            // <block/> directly under the root
            Event::Empty(e)
                if depth == 1 && !done && has_block && e.name().as_ref() == block.as_bytes() =>
            {
                write(&mut writer, &Event::Start(e.clone()))?;
                write_entries(&mut writer, entries)?;
                write(&mut writer, &Event::End(BytesEnd::new(block)))?;
                done = true;
            }
            Event::End(e) => {
                if !done {
                    if has_block && depth == 2 && e.name().as_ref() == block.as_bytes() {
                        write_entries(&mut writer, entries)?;
                        done = true;
                    } else if !has_block && depth == 1 {
                        write(&mut writer, &Event::Start(BytesStart::new(block)))?;
                        write_entries(&mut writer, entries)?;
                        write(&mut writer, &Event::End(BytesEnd::new(block)))?;
                        done = true;
                    }
                }
                depth = depth.saturating_sub(1);
                write(&mut writer, &event)?;
            }
            _ => write(&mut writer, &event)?,
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| FactoryError::invalid(format!("rewritten XML is not UTF-8: {}", e)))
}

/// Direct text of the first element named `name`, anywhere in the document
pub fn first_element_text(xml: &str, name: &str) -> Result<Option<String>> {
    let mut reader = reader(xml);
    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) if !capturing && e.name().as_ref() == name.as_bytes() => {
                capturing = true;
            }
            Event::Empty(e) if !capturing && e.name().as_ref() == name.as_bytes() => {
                return Ok(Some(String::new()));
            }
            Event::Text(t) if capturing => {
                text.push_str(&t.unescape().map_err(malformed)?);
            }
            Event::CData(c) if capturing => {
                let raw: &[u8] = &c;
                text.push_str(&String::from_utf8_lossy(raw));
            }
            Event::Start(_) | Event::Empty(_) | Event::End(_) if capturing => {
                return Ok(Some(text));
            }
            Event::Eof => return Ok(if capturing { Some(text) } else { None }),
            _ => {}
        }
    }
}
