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

use codespan_reporting::diagnostic;
use codespan_reporting::files;
use serde::Serialize;
use std::fmt;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

#[derive(Debug, Default, Copy, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Byte offset into the file (counted from zero).
    pub offset: usize,
    /// Line number (counted from zero).
    pub line: usize,
    /// Column number (counted from zero)
    pub column: usize,
}

#[derive(Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub file: FileId,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

/// Message direction tag.
///
/// Requests travel from the client to the server, events the other way
/// around. A message's opcode is its zero-based position among the
/// same-kind siblings of its interface, in document order.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Event,
}

/// Argument wire kind, mirroring the `type` attribute of `arg` elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Int,
    Uint,
    Fixed,
    String,
    Array,
    Fd,
    NewId,
    Object,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "arg")]
pub struct Arg {
    pub loc: SourceRange,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArgKind,
    /// Target interface name, for `object` and `new_id` arguments that
    /// declare one.
    pub interface: Option<String>,
    pub allow_null: bool,
    /// Enum reference, either bare (`transform`) or qualified
    /// (`wl_output.transform`).
    #[serde(rename = "enum")]
    pub enum_: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "message")]
pub struct Message {
    pub loc: SourceRange,
    pub name: String,
    #[serde(rename = "message_kind")]
    pub kind: MessageKind,
    pub description: Option<String>,
    pub args: Vec<Arg>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "entry")]
pub struct Entry {
    pub loc: SourceRange,
    pub name: String,
    pub value: u32,
    pub summary: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "enum")]
pub struct EnumDef {
    pub loc: SourceRange,
    pub name: String,
    pub bitfield: bool,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "interface")]
pub struct Interface {
    pub loc: SourceRange,
    pub name: String,
    pub version: u32,
    pub description: Option<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<EnumDef>,
}

/// One parsed schema document.
#[derive(Debug, Serialize, Clone)]
pub struct Protocol {
    pub name: String,
    pub file: FileId,
    pub interfaces: Vec<Interface>,
}

impl SourceLocation {
    /// Construct a new source location.
    ///
    /// The `line_starts` indicates the byte offsets where new lines
    /// start in the file. The first element should thus be `0` since
    /// every file has at least one line starting at offset `0`.
    pub fn new(offset: usize, line_starts: &[usize]) -> SourceLocation {
        let mut loc = SourceLocation { offset, line: 0, column: offset };
        for (line, start) in line_starts.iter().enumerate() {
            if *start > offset {
                break;
            }
            loc = SourceLocation { offset, line, column: offset - start };
        }
        loc
    }
}

impl SourceRange {
    pub fn primary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::primary(self.file, self.start.offset..self.end.offset)
    }
    pub fn secondary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::secondary(self.file, self.start.offset..self.end.offset)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange").finish_non_exhaustive()
    }
}

impl Eq for Arg {}
impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.name == other.name
            && self.kind == other.kind
            && self.interface == other.interface
            && self.allow_null == other.allow_null
            && self.enum_ == other.enum_
    }
}

impl Eq for Message {}
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc and description.
        self.name == other.name && self.kind == other.kind && self.args == other.args
    }
}

impl Eq for Entry {}
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc and summary.
        self.name == other.name && self.value == other.value
    }
}

impl Eq for EnumDef {}
impl PartialEq for EnumDef {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.name == other.name && self.bitfield == other.bitfield && self.entries == other.entries
    }
}

impl Eq for Interface {}
impl PartialEq for Interface {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc and description.
        self.name == other.name
            && self.version == other.version
            && self.messages == other.messages
            && self.enums == other.enums
    }
}

impl Eq for Protocol {}
impl PartialEq for Protocol {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out the file id.
        self.name == other.name && self.interfaces == other.interfaces
    }
}

impl ArgKind {
    pub fn from_attr(value: &str) -> Option<ArgKind> {
        Some(match value {
            "int" => ArgKind::Int,
            "uint" => ArgKind::Uint,
            "fixed" => ArgKind::Fixed,
            "string" => ArgKind::String,
            "array" => ArgKind::Array,
            "fd" => ArgKind::Fd,
            "new_id" => ArgKind::NewId,
            "object" => ArgKind::Object,
            _ => return None,
        })
    }
}

impl Interface {
    /// Iterate over the messages of the selected direction, in document
    /// order. The iteration index is the message opcode.
    pub fn messages(&self, kind: MessageKind) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |message| message.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(name: &str, kind: ArgKind) -> Arg {
        Arg {
            loc: SourceRange::default(),
            name: name.to_owned(),
            kind,
            interface: None,
            allow_null: false,
            enum_: None,
        }
    }

    #[test]
    fn source_location_new() {
        let line_starts = &[0, 20, 80, 120, 150];
        assert_eq!(
            SourceLocation::new(0, line_starts),
            SourceLocation { offset: 0, line: 0, column: 0 }
        );
        assert_eq!(
            SourceLocation::new(50, line_starts),
            SourceLocation { offset: 50, line: 1, column: 30 }
        );
        assert_eq!(
            SourceLocation::new(1000, line_starts),
            SourceLocation { offset: 1000, line: 4, column: 850 }
        );
    }

    #[test]
    fn source_location_new_no_crash_with_empty_line_starts() {
        let loc = SourceLocation::new(100, &[]);
        assert_eq!(loc, SourceLocation { offset: 100, line: 0, column: 100 });
    }

    #[test]
    fn messages_filter_by_direction() {
        let message = |name: &str, kind| Message {
            loc: SourceRange::default(),
            name: name.to_owned(),
            kind,
            description: None,
            args: vec![],
        };
        let interface = Interface {
            loc: SourceRange::default(),
            name: "wl_seat".to_owned(),
            version: 1,
            description: None,
            messages: vec![
                message("get_pointer", MessageKind::Request),
                message("capabilities", MessageKind::Event),
                message("release", MessageKind::Request),
            ],
            enums: vec![],
        };
        let requests: Vec<_> =
            interface.messages(MessageKind::Request).map(|m| m.name.as_str()).collect();
        assert_eq!(requests, ["get_pointer", "release"]);
        let events: Vec<_> =
            interface.messages(MessageKind::Event).map(|m| m.name.as_str()).collect();
        assert_eq!(events, ["capabilities"]);
    }

    #[test]
    fn structural_equality_ignores_locations() {
        let mut left = arg("surface", ArgKind::Object);
        let mut right = arg("surface", ArgKind::Object);
        right.loc = SourceRange {
            file: 7,
            start: SourceLocation { offset: 10, line: 1, column: 2 },
            end: SourceLocation { offset: 20, line: 1, column: 12 },
        };
        assert_eq!(left, right);
        left.allow_null = true;
        assert_ne!(left, right);
    }
}
