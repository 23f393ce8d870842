// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema document loader.
//!
//! Protocol schemas are XML documents with a `protocol` root containing
//! ordered `interface` elements. The loader validates required attributes
//! immediately and reports failures as diagnostics pointing at the
//! offending element, instead of deferring attribute lookups to the
//! emission phase.

use crate::ast;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

struct Context<'a> {
    file: ast::FileId,
    line_starts: &'a [usize],
}

impl Context<'_> {
    fn range(&self, start: usize, end: usize) -> ast::SourceRange {
        ast::SourceRange {
            file: self.file,
            start: ast::SourceLocation::new(start, self.line_starts),
            end: ast::SourceLocation::new(end, self.line_starts),
        }
    }
}

/// Element wrapper carrying the decoded tag name, attributes, and source
/// range of the opening tag.
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    loc: ast::SourceRange,
    /// Self-closing elements have no children to consume.
    empty: bool,
}

impl Element {
    fn new(
        context: &Context<'_>,
        event: &BytesStart<'_>,
        start: usize,
        end: usize,
        empty: bool,
    ) -> Result<Element, Diagnostic<ast::FileId>> {
        let loc = context.range(start, end);
        let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
        let mut attributes = vec![];
        for attribute in event.attributes() {
            let attribute = attribute.map_err(|err| {
                Diagnostic::error()
                    .with_message(format!("malformed attribute in `{name}` element: {err}"))
                    .with_labels(vec![loc.primary()])
            })?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| {
                    Diagnostic::error()
                        .with_message(format!("malformed attribute value in `{name}`: {err}"))
                        .with_labels(vec![loc.primary()])
                })?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Element { name, attributes, loc, empty })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, key: &str) -> Result<String, Diagnostic<ast::FileId>> {
        self.attr(key).map(str::to_owned).ok_or_else(|| {
            Diagnostic::error()
                .with_message(format!(
                    "`{}` element is missing the required attribute `{}`",
                    self.name, key
                ))
                .with_labels(vec![self.loc.primary()])
        })
    }

    fn unrecognized(&self, parent: &str) -> Diagnostic<ast::FileId> {
        Diagnostic::error()
            .with_message(format!("unrecognized element `{}` in `{parent}`", self.name))
            .with_labels(vec![self.loc.primary()])
    }
}

/// Parse an integer attribute value, accepting the decimal and `0x`
/// hexadecimal spellings used by schema authors.
fn parse_integer(text: &str) -> Option<u32> {
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(digits, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn integer_attr(element: &Element, key: &str) -> Result<u32, Diagnostic<ast::FileId>> {
    let text = element.required_attr(key)?;
    parse_integer(&text).ok_or_else(|| {
        Diagnostic::error()
            .with_message(format!(
                "`{}` attribute `{}` is not a valid integer: `{}`",
                element.name, key, text
            ))
            .with_labels(vec![element.loc.primary()])
    })
}

struct DocumentReader<'a, 'i> {
    reader: Reader<&'i [u8]>,
    context: &'a Context<'a>,
}

enum Node {
    Element(Element),
    End,
}

impl<'a, 'i> DocumentReader<'a, 'i> {
    fn new(source: &'i str, context: &'a Context<'a>) -> DocumentReader<'a, 'i> {
        DocumentReader { reader: Reader::from_str(source), context }
    }

    /// Return the next child element at the current nesting level, or
    /// `Node::End` when the enclosing element (or document) closes.
    /// Text, comments, and processing instructions are skipped.
    fn next_node(&mut self) -> Result<Option<Node>, Diagnostic<ast::FileId>> {
        loop {
            let start = self.reader.buffer_position() as usize;
            let event = self.reader.read_event().map_err(|err| {
                let loc = self.context.range(start, self.reader.buffer_position() as usize);
                Diagnostic::error()
                    .with_message(format!("failed to parse schema document: {err}"))
                    .with_labels(vec![loc.primary()])
            })?;
            let end = self.reader.buffer_position() as usize;
            match event {
                Event::Start(ref element) => {
                    return Ok(Some(Node::Element(Element::new(
                        self.context,
                        element,
                        start,
                        end,
                        false,
                    )?)))
                }
                Event::Empty(ref element) => {
                    return Ok(Some(Node::Element(Element::new(
                        self.context,
                        element,
                        start,
                        end,
                        true,
                    )?)))
                }
                Event::End(_) => return Ok(Some(Node::End)),
                Event::Eof => return Ok(None),
                Event::Text(_)
                | Event::CData(_)
                | Event::Comment(_)
                | Event::Decl(_)
                | Event::PI(_)
                | Event::DocType(_) => continue,
            }
        }
    }

    /// Consume the remaining children of an element, including nested
    /// elements, up to its closing tag.
    fn skip_children(&mut self, element: &Element) -> Result<(), Diagnostic<ast::FileId>> {
        if element.empty {
            return Ok(());
        }
        let mut depth = 0usize;
        loop {
            match self.next_node()? {
                Some(Node::Element(child)) if !child.empty => depth += 1,
                Some(Node::Element(_)) => (),
                Some(Node::End) if depth == 0 => return Ok(()),
                Some(Node::End) => depth -= 1,
                None => {
                    return Err(Diagnostic::error()
                        .with_message(format!("`{}` element is never closed", element.name))
                        .with_labels(vec![element.loc.primary()]))
                }
            }
        }
    }

    /// Read the `summary` attribute of a `description` child and skip
    /// over its free-form body text.
    fn parse_description(
        &mut self,
        element: &Element,
    ) -> Result<Option<String>, Diagnostic<ast::FileId>> {
        let summary = element.attr("summary").map(str::to_owned);
        self.skip_children(element)?;
        Ok(summary)
    }

    fn parse_arg(&mut self, element: &Element) -> Result<ast::Arg, Diagnostic<ast::FileId>> {
        let name = element.required_attr("name")?;
        let kind_attr = element.required_attr("type")?;
        let kind = ast::ArgKind::from_attr(&kind_attr).ok_or_else(|| {
            Diagnostic::error()
                .with_message(format!("argument `{name}` has unknown type `{kind_attr}`"))
                .with_labels(vec![element.loc.primary()])
        })?;
        let arg = ast::Arg {
            loc: element.loc,
            name,
            kind,
            interface: element.attr("interface").map(str::to_owned),
            allow_null: element.attr("allow-null") == Some("true"),
            enum_: element.attr("enum").map(str::to_owned),
        };
        self.skip_children(element)?;
        Ok(arg)
    }

    fn parse_message(
        &mut self,
        element: &Element,
        kind: ast::MessageKind,
    ) -> Result<ast::Message, Diagnostic<ast::FileId>> {
        let name = element.required_attr("name")?;
        let mut description = None;
        let mut args = vec![];
        if !element.empty {
            loop {
                match self.next_node()? {
                    Some(Node::Element(child)) => match child.name.as_str() {
                        "arg" => args.push(self.parse_arg(&child)?),
                        "description" => description = self.parse_description(&child)?,
                        _ => return Err(child.unrecognized(&element.name)),
                    },
                    Some(Node::End) => break,
                    None => break,
                }
            }
        }
        Ok(ast::Message { loc: element.loc, name, kind, description, args })
    }

    fn parse_entry(&mut self, element: &Element) -> Result<ast::Entry, Diagnostic<ast::FileId>> {
        let name = element.required_attr("name")?;
        let value = integer_attr(element, "value")?;
        let summary = element.attr("summary").map(str::to_owned);
        self.skip_children(element)?;
        Ok(ast::Entry { loc: element.loc, name, value, summary })
    }

    fn parse_enum(&mut self, element: &Element) -> Result<ast::EnumDef, Diagnostic<ast::FileId>> {
        let name = element.required_attr("name")?;
        let bitfield = element.attr("bitfield") == Some("true");
        let mut entries = vec![];
        if !element.empty {
            loop {
                match self.next_node()? {
                    Some(Node::Element(child)) => match child.name.as_str() {
                        "entry" => entries.push(self.parse_entry(&child)?),
                        "description" => {
                            self.skip_children(&child)?;
                        }
                        _ => return Err(child.unrecognized("enum")),
                    },
                    Some(Node::End) => break,
                    None => break,
                }
            }
        }
        Ok(ast::EnumDef { loc: element.loc, name, bitfield, entries })
    }

    fn parse_interface(
        &mut self,
        element: &Element,
    ) -> Result<ast::Interface, Diagnostic<ast::FileId>> {
        let name = element.required_attr("name")?;
        let version = match element.attr("version") {
            Some(_) => integer_attr(element, "version")?,
            None => 1,
        };
        let mut description = None;
        let mut messages = vec![];
        let mut enums = vec![];
        if !element.empty {
            loop {
                match self.next_node()? {
                    Some(Node::Element(child)) => match child.name.as_str() {
                        "request" => {
                            messages.push(self.parse_message(&child, ast::MessageKind::Request)?)
                        }
                        "event" => {
                            messages.push(self.parse_message(&child, ast::MessageKind::Event)?)
                        }
                        "enum" => enums.push(self.parse_enum(&child)?),
                        "description" => description = self.parse_description(&child)?,
                        _ => return Err(child.unrecognized("interface")),
                    },
                    Some(Node::End) => break,
                    None => break,
                }
            }
        }
        Ok(ast::Interface { loc: element.loc, name, version, description, messages, enums })
    }

    fn parse_protocol(&mut self) -> Result<ast::Protocol, Diagnostic<ast::FileId>> {
        let root = loop {
            match self.next_node()? {
                Some(Node::Element(element)) => break element,
                Some(Node::End) => continue,
                None => {
                    return Err(Diagnostic::error()
                        .with_message("schema document contains no protocol element"))
                }
            }
        };
        if root.name != "protocol" {
            return Err(Diagnostic::error()
                .with_message(format!("expected `protocol` root element, found `{}`", root.name))
                .with_labels(vec![root.loc.primary()]));
        }
        let name = root.required_attr("name")?;
        let mut interfaces = vec![];
        if !root.empty {
            loop {
                match self.next_node()? {
                    Some(Node::Element(child)) => match child.name.as_str() {
                        "interface" => interfaces.push(self.parse_interface(&child)?),
                        "copyright" | "description" => {
                            self.skip_children(&child)?;
                        }
                        _ => return Err(child.unrecognized("protocol")),
                    },
                    Some(Node::End) => break,
                    None => break,
                }
            }
        }
        Ok(ast::Protocol { name, file: self.context.file, interfaces })
    }
}

/// Parse schema source from a string.
///
/// The document is added to the compilation database under the provided
/// name.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<ast::Protocol, Diagnostic<ast::FileId>> {
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let file = sources.add(name.to_owned(), source.clone());
    let context = Context { file, line_starts: &line_starts };
    DocumentReader::new(&source, &context).parse_protocol()
}

/// Parse a new schema file.
///
/// The source file is fully read and added to the compilation
/// database. Returns the constructed schema, or a descriptive error
/// diagnostic in case of failure.
pub fn parse_file(
    sources: &mut ast::SourceDatabase,
    name: &str,
) -> Result<ast::Protocol, Diagnostic<ast::FileId>> {
    let source = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    parse_inline(sources, name, source)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{ArgKind, MessageKind};

    macro_rules! raises {
        ($text:literal, $needle:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let result = parse_inline(&mut db, "stdin", $text.to_owned());
            let diagnostic = result.expect_err("parsing should have failed");
            assert!(
                diagnostic.message.contains($needle),
                "expected {:?} in {:?}",
                $needle,
                diagnostic.message
            );
        }};
    }

    fn parse(text: &str) -> ast::Protocol {
        let mut db = ast::SourceDatabase::new();
        parse_inline(&mut db, "stdin", text.to_owned()).expect("parsing failure")
    }

    #[test]
    fn parses_interfaces_messages_and_args_in_order() {
        let protocol = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <protocol name="sample">
              <copyright>who cares</copyright>
              <interface name="wl_seat" version="4">
                <description summary="a seat"/>
                <request name="get_pointer">
                  <arg name="id" type="new_id" interface="wl_pointer"/>
                </request>
                <event name="capabilities">
                  <arg name="capabilities" type="uint" enum="capability"/>
                </event>
                <request name="release"/>
              </interface>
            </protocol>"#,
        );
        assert_eq!(protocol.name, "sample");
        assert_eq!(protocol.interfaces.len(), 1);
        let interface = &protocol.interfaces[0];
        assert_eq!(interface.name, "wl_seat");
        assert_eq!(interface.version, 4);
        assert_eq!(interface.description.as_deref(), Some("a seat"));
        let names: Vec<_> = interface.messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["get_pointer", "capabilities", "release"]);
        assert_eq!(interface.messages[0].kind, MessageKind::Request);
        assert_eq!(interface.messages[1].kind, MessageKind::Event);
        assert_eq!(interface.messages[0].args[0].kind, ArgKind::NewId);
        assert_eq!(interface.messages[0].args[0].interface.as_deref(), Some("wl_pointer"));
        assert_eq!(interface.messages[1].args[0].enum_.as_deref(), Some("capability"));
    }

    #[test]
    fn parses_enum_entries_with_hex_values() {
        let protocol = parse(
            r#"<protocol name="sample">
              <interface name="wl_shm">
                <enum name="format">
                  <entry name="argb8888" value="0"/>
                  <entry name="xrgb8888" value="0x1" summary="32-bit RGB"/>
                </enum>
              </interface>
            </protocol>"#,
        );
        let entries = &protocol.interfaces[0].enums[0].entries;
        assert_eq!(entries[0].value, 0);
        assert_eq!(entries[1].value, 1);
        assert_eq!(entries[1].summary.as_deref(), Some("32-bit RGB"));
        assert!(!protocol.interfaces[0].enums[0].bitfield);
    }

    #[test]
    fn parses_bitfield_marker_and_allow_null() {
        let protocol = parse(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <request name="attach">
                  <arg name="surface" type="object" interface="wl_surface" allow-null="true"/>
                </request>
                <enum name="capability" bitfield="true">
                  <entry name="pointer" value="1"/>
                </enum>
              </interface>
            </protocol>"#,
        );
        assert!(protocol.interfaces[0].messages[0].args[0].allow_null);
        assert!(protocol.interfaces[0].enums[0].bitfield);
    }

    #[test]
    fn rejects_unrecognized_root_element() {
        raises!(r#"<schema name="sample"/>"#, "expected `protocol` root element");
    }

    #[test]
    fn rejects_missing_message_name() {
        raises!(
            r#"<protocol name="sample">
              <interface name="wl_seat"><request/></interface>
            </protocol>"#,
            "missing the required attribute `name`"
        );
    }

    #[test]
    fn rejects_missing_arg_type() {
        raises!(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <request name="attach"><arg name="surface"/></request>
              </interface>
            </protocol>"#,
            "missing the required attribute `type`"
        );
    }

    #[test]
    fn rejects_unknown_arg_type() {
        raises!(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <request name="attach"><arg name="surface" type="pointer"/></request>
              </interface>
            </protocol>"#,
            "unknown type `pointer`"
        );
    }

    #[test]
    fn rejects_unrecognized_interface_child() {
        raises!(
            r#"<protocol name="sample">
              <interface name="wl_seat"><method name="attach"/></interface>
            </protocol>"#,
            "unrecognized element `method`"
        );
    }

    #[test]
    fn rejects_malformed_entry_value() {
        raises!(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <enum name="capability"><entry name="pointer" value="one"/></enum>
              </interface>
            </protocol>"#,
            "not a valid integer"
        );
    }
}
