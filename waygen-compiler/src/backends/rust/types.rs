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

//! Argument type resolution.
//!
//! Maps each schema argument to its value representation in the generated
//! bindings and to the `Context` accessor pair used to move it across the
//! wire. Pure functions of the argument and the enum registry; unknown
//! references are rejected by the analyzer before emission starts.

use crate::analyzer::EnumRegistry;
use crate::ast;
use crate::backends::rust::{enum_type_ident, interface_type_ident};
use quote::{format_ident, quote};

/// Wire-level representation of a scalar argument, naming the `next_*`
/// and `put_*` accessor suffix of the runtime transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireType {
    Int,
    Uint,
    Fixed,
    String,
    Array,
    Fd,
    NewId,
}

impl WireType {
    fn suffix(self) -> &'static str {
        match self {
            WireType::Int => "int",
            WireType::Uint => "uint",
            WireType::Fixed => "fixed",
            WireType::String => "string",
            WireType::Array => "array",
            WireType::Fd => "fd",
            WireType::NewId => "new_id",
        }
    }

    pub fn next_accessor(self) -> proc_macro2::Ident {
        format_ident!("next_{}", self.suffix())
    }

    pub fn put_accessor(self) -> proc_macro2::Ident {
        format_ident!("put_{}", self.suffix())
    }

    pub fn rust_type(self) -> proc_macro2::TokenStream {
        match self {
            WireType::Int => quote!(i32),
            WireType::Uint | WireType::NewId => quote!(u32),
            WireType::Fixed => quote!(f32),
            WireType::String => quote!(String),
            WireType::Array => quote!(Vec<u32>),
            WireType::Fd => quote!(Fd),
        }
    }
}

/// Resolved value representation of one argument.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Scalar(WireType),
    /// Enum-referencing argument. `qualified` is the `interface.enum`
    /// pair used in runtime error payloads, `wire` the scalar carrier.
    Enum { type_name: proc_macro2::Ident, qualified: String, wire: WireType, bitfield: bool },
    /// Object reference, typed when the schema declares a target
    /// interface.
    Object { interface: Option<proc_macro2::Ident>, interface_name: Option<String>, nullable: bool },
}

fn wire_type(kind: ast::ArgKind) -> WireType {
    match kind {
        ast::ArgKind::Int => WireType::Int,
        ast::ArgKind::Uint => WireType::Uint,
        ast::ArgKind::Fixed => WireType::Fixed,
        ast::ArgKind::String => WireType::String,
        ast::ArgKind::Array => WireType::Array,
        ast::ArgKind::Fd => WireType::Fd,
        ast::ArgKind::NewId => WireType::NewId,
        // Objects travel as plain ids.
        ast::ArgKind::Object => WireType::Uint,
    }
}

/// Resolve an argument from the scope of the named interface.
///
/// An enum reference takes precedence over every other classification:
/// valid schemas never put one on an object argument, but if present the
/// enum mapping wins deterministically.
pub fn resolve(scope: &str, arg: &ast::Arg, registry: &EnumRegistry) -> TypeDescriptor {
    if let Some(reference) = &arg.enum_ {
        let resolved = registry
            .resolve(scope, reference)
            .unwrap_or_else(|| panic!("unresolved enum reference `{reference}` in `{scope}`"));
        return TypeDescriptor::Enum {
            type_name: enum_type_ident(resolved.interface, resolved.name),
            qualified: format!("{}.{}", resolved.interface, resolved.name),
            wire: match arg.kind {
                ast::ArgKind::Int => WireType::Int,
                _ => WireType::Uint,
            },
            bitfield: resolved.bitfield,
        };
    }
    match arg.kind {
        ast::ArgKind::Object => TypeDescriptor::Object {
            interface: arg.interface.as_deref().map(interface_type_ident),
            interface_name: arg.interface.clone(),
            nullable: arg.allow_null,
        },
        kind => TypeDescriptor::Scalar(wire_type(kind)),
    }
}

impl TypeDescriptor {
    /// Value representation used in the generated message records.
    pub fn rust_type(&self) -> proc_macro2::TokenStream {
        match self {
            TypeDescriptor::Scalar(wire) => wire.rust_type(),
            TypeDescriptor::Enum { type_name, .. } => quote!(#type_name),
            TypeDescriptor::Object { interface, nullable, .. } => {
                let object = match interface {
                    Some(interface) => quote!(#interface),
                    None => quote!(Object),
                };
                if *nullable {
                    quote!(Option<#object>)
                } else {
                    object
                }
            }
        }
    }

    /// Parameter type of the typed send functions. Borrows what the
    /// wire only copies out of.
    pub fn param_type(&self) -> proc_macro2::TokenStream {
        match self {
            TypeDescriptor::Scalar(WireType::String) => quote!(&str),
            TypeDescriptor::Scalar(WireType::Array) => quote!(&[u32]),
            TypeDescriptor::Object { interface, nullable, .. } => {
                let object = match interface {
                    Some(interface) => quote!(&#interface),
                    None => quote!(&Object),
                };
                if *nullable {
                    quote!(Option<#object>)
                } else {
                    object
                }
            }
            other => other.rust_type(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::EnumRegistry;
    use crate::ast;
    use crate::parser::parse_inline;

    fn sample() -> (ast::Protocol, EnumRegistry) {
        let mut db = ast::SourceDatabase::new();
        let protocol = parse_inline(
            &mut db,
            "stdin",
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <enum name="capability" bitfield="true">
                  <entry name="pointer" value="1"/>
                </enum>
                <request name="frobnicate">
                  <arg name="serial" type="uint"/>
                  <arg name="surface" type="object" interface="wl_surface" allow-null="true"/>
                  <arg name="capabilities" type="uint" enum="capability"/>
                  <arg name="keymap" type="fd"/>
                </request>
              </interface>
              <interface name="wl_surface"/>
            </protocol>"#
                .to_owned(),
        )
        .unwrap();
        let registry = EnumRegistry::new(&protocol);
        (protocol, registry)
    }

    fn resolved(index: usize) -> TypeDescriptor {
        let (protocol, registry) = sample();
        resolve("wl_seat", &protocol.interfaces[0].messages[0].args[index], &registry)
    }

    #[test]
    fn scalars_map_to_their_carrier_types() {
        match resolved(0) {
            TypeDescriptor::Scalar(wire) => {
                assert_eq!(wire, WireType::Uint);
                assert_eq!(wire.next_accessor().to_string(), "next_uint");
                assert_eq!(wire.put_accessor().to_string(), "put_uint");
            }
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn nullable_typed_objects_become_options() {
        let descriptor = resolved(1);
        assert_eq!(descriptor.rust_type().to_string(), "Option < WlSurface >");
        match descriptor {
            TypeDescriptor::Object { nullable, interface_name, .. } => {
                assert!(nullable);
                assert_eq!(interface_name.as_deref(), Some("wl_surface"));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn enum_reference_resolves_to_generated_type() {
        match resolved(2) {
            TypeDescriptor::Enum { type_name, qualified, bitfield, .. } => {
                assert_eq!(type_name.to_string(), "WlSeatCapability");
                assert_eq!(qualified, "wl_seat.capability");
                assert!(bitfield);
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn enum_reference_wins_over_object_typing() {
        let (_, registry) = sample();
        let arg = ast::Arg {
            loc: Default::default(),
            name: "weird".to_owned(),
            kind: ast::ArgKind::Object,
            interface: Some("wl_surface".to_owned()),
            allow_null: false,
            enum_: Some("capability".to_owned()),
        };
        match resolve("wl_seat", &arg, &registry) {
            TypeDescriptor::Enum { type_name, .. } => {
                assert_eq!(type_name.to_string(), "WlSeatCapability")
            }
            other => panic!("expected enum to win, got {other:?}"),
        }
    }

    #[test]
    fn fd_arguments_use_the_handle_type() {
        assert_eq!(resolved(3).rust_type().to_string(), "Fd");
    }
}
