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

//! Schema analysis: document concatenation, the one-time registry-bind
//! normalization, enum/bitfield classification, and reference validation.
//!
//! The analyzer runs to completion before any code is emitted, so the
//! backends can assume every enum and interface reference resolves.

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;

/// List of unique errors reported as analyzer diagnostics.
#[repr(u16)]
#[derive(Copy, Clone)]
pub enum ErrorCode {
    DuplicateInterfaceIdentifier = 1,
    UndeclaredEnumIdentifier = 2,
    UndeclaredInterfaceIdentifier = 3,
    DuplicateEnumIdentifier = 4,
    DuplicateMessageIdentifier = 5,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate analyzer diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

impl Diagnostics {
    fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    fn err_or<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

/// Compile-time classification of every enumeration declared by any
/// interface, keyed by `(interface, enum)`.
///
/// The registry is built for the whole document list before any message
/// is resolved: an argument in interface A may reference an enum declared
/// in interface B, and the encoding strategy (bitfield mask vs discrete
/// value) must be known when A is emitted.
#[derive(Debug, Default)]
pub struct EnumRegistry {
    /// Classification entries in document order. The order makes bare
    /// cross-interface lookups deterministic.
    entries: Vec<(String, String, bool)>,
    index: HashMap<(String, String), bool>,
}

/// A resolved enum reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedEnum<'d> {
    pub interface: &'d str,
    pub name: &'d str,
    pub bitfield: bool,
}

impl EnumRegistry {
    /// Phase one of the pipeline: record every enum declaration of every
    /// interface. The returned registry is immutable.
    pub fn new(protocol: &Protocol) -> EnumRegistry {
        let mut registry = EnumRegistry::default();
        for interface in &protocol.interfaces {
            for enum_def in &interface.enums {
                registry.entries.push((
                    interface.name.clone(),
                    enum_def.name.clone(),
                    enum_def.bitfield,
                ));
                registry
                    .index
                    .insert((interface.name.clone(), enum_def.name.clone()), enum_def.bitfield);
            }
        }
        registry
    }

    fn get<'d>(&'d self, interface: &str, name: &str) -> Option<ResolvedEnum<'d>> {
        // Round-trip through entries to return borrowed key strings.
        self.index.get_key_value(&(interface.to_owned(), name.to_owned())).map(
            |((interface, name), bitfield)| ResolvedEnum { interface, name, bitfield: *bitfield },
        )
    }

    /// Resolve an argument's enum reference from the scope of the named
    /// interface: a qualified `interface.enum` reference is looked up
    /// directly, a bare reference is tried against the local interface
    /// first and then against the remaining interfaces in document order.
    pub fn resolve<'d>(&'d self, scope: &str, reference: &str) -> Option<ResolvedEnum<'d>> {
        if let Some((interface, name)) = reference.split_once('.') {
            return self.get(interface, name);
        }
        self.get(scope, reference).or_else(|| {
            self.entries
                .iter()
                .find(|(_, name, _)| name == reference)
                .map(|(interface, name, bitfield)| ResolvedEnum {
                    interface,
                    name,
                    bitfield: *bitfield,
                })
        })
    }
}

/// Concatenate parsed documents into a single schema, in input order.
/// Interfaces are never merged by name; a duplicate survives here and is
/// rejected by `analyze` before the global unions are formed.
pub fn concat(protocols: Vec<Protocol>) -> Protocol {
    let mut protocols = protocols.into_iter();
    let mut combined = protocols.next().unwrap_or(Protocol {
        name: String::new(),
        file: 0,
        interfaces: vec![],
    });
    for protocol in protocols {
        combined.name = format!("{}+{}", combined.name, protocol.name);
        combined.interfaces.extend(protocol.interfaces);
    }
    combined
}

/// The one schema mutation of the whole pipeline.
///
/// The schema format cannot express that the registry `bind` request
/// carries the bound interface name and version on the wire; the two
/// synthetic arguments are inserted here, once, before emission starts.
/// The insertion is guarded so an already-normalized schema passes
/// through unchanged.
pub fn normalize(protocol: &mut Protocol) {
    for interface in &mut protocol.interfaces {
        if !matches!(interface.name.as_str(), "registry" | "wl_registry") {
            continue;
        }
        for message in &mut interface.messages {
            if message.kind != MessageKind::Request || message.name != "bind" {
                continue;
            }
            if message.args.iter().any(|arg| arg.name == "interface") {
                continue;
            }
            let position = 2.min(message.args.len());
            let loc = message.loc;
            let synthetic = move |name: &str, kind: ArgKind| Arg {
                loc,
                name: name.to_owned(),
                kind,
                interface: None,
                allow_null: false,
                enum_: None,
            };
            message.args.insert(position, synthetic("version", ArgKind::Uint));
            message.args.insert(position, synthetic("interface", ArgKind::String));
        }
    }
}

fn check_interface_identifiers(protocol: &Protocol) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    let mut seen: HashMap<&str, &Interface> = HashMap::new();
    for interface in &protocol.interfaces {
        if let Some(prev) = seen.insert(&interface.name, interface) {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::DuplicateInterfaceIdentifier)
                    .with_message(format!(
                        "redeclaration of interface identifier `{}`",
                        interface.name
                    ))
                    .with_labels(vec![
                        interface.loc.primary(),
                        prev.loc.secondary().with_message(format!(
                            "`{}` is first declared here",
                            interface.name
                        )),
                    ]),
            )
        }
    }
    diagnostics.err_or(())
}

fn check_member_identifiers(protocol: &Protocol) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    for interface in &protocol.interfaces {
        let mut enums: HashMap<&str, &EnumDef> = HashMap::new();
        for enum_def in &interface.enums {
            if let Some(prev) = enums.insert(&enum_def.name, enum_def) {
                diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::DuplicateEnumIdentifier)
                        .with_message(format!(
                            "redeclaration of enum identifier `{}.{}`",
                            interface.name, enum_def.name
                        ))
                        .with_labels(vec![enum_def.loc.primary(), prev.loc.secondary()]),
                )
            }
        }
        let mut messages: HashMap<(MessageKind, &str), &Message> = HashMap::new();
        for message in &interface.messages {
            if let Some(prev) = messages.insert((message.kind, &message.name), message) {
                diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::DuplicateMessageIdentifier)
                        .with_message(format!(
                            "redeclaration of message identifier `{}.{}`",
                            interface.name, message.name
                        ))
                        .with_labels(vec![message.loc.primary(), prev.loc.secondary()]),
                )
            }
        }
    }
    diagnostics.err_or(())
}

fn check_references(protocol: &Protocol, registry: &EnumRegistry) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    let interfaces: Vec<&str> =
        protocol.interfaces.iter().map(|interface| interface.name.as_str()).collect();
    for interface in &protocol.interfaces {
        for message in &interface.messages {
            for arg in &message.args {
                if let Some(reference) = &arg.enum_ {
                    if registry.resolve(&interface.name, reference).is_none() {
                        diagnostics.push(
                            Diagnostic::error()
                                .with_code(ErrorCode::UndeclaredEnumIdentifier)
                                .with_message(format!(
                                    "undeclared enum identifier `{reference}` referenced by \
                                     argument `{}` of `{}.{}`",
                                    arg.name, interface.name, message.name
                                ))
                                .with_labels(vec![arg.loc.primary()]),
                        )
                    }
                }
                if let Some(target) = &arg.interface {
                    if !interfaces.contains(&target.as_str()) {
                        diagnostics.push(
                            Diagnostic::error()
                                .with_code(ErrorCode::UndeclaredInterfaceIdentifier)
                                .with_message(format!(
                                    "undeclared interface identifier `{target}` referenced by \
                                     argument `{}` of `{}.{}`",
                                    arg.name, interface.name, message.name
                                ))
                                .with_labels(vec![arg.loc.primary()]),
                        )
                    }
                }
            }
        }
    }
    diagnostics.err_or(())
}

/// Analyzer entry point: concatenates the parsed documents, applies the
/// one-time schema normalization, and validates every identifier
/// reference. Returns the normalized schema on success.
pub fn analyze(protocols: Vec<Protocol>) -> Result<Protocol, Diagnostics> {
    let mut protocol = concat(protocols);
    normalize(&mut protocol);
    check_interface_identifiers(&protocol)?;
    check_member_identifiers(&protocol)?;
    let registry = EnumRegistry::new(&protocol);
    check_references(&protocol, &registry)?;
    Ok(protocol)
}
