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

//! Rust binding generator backend.
//!
//! For every interface, in document order: a value struct with its
//! constructor, an opcode-indexed dispatcher for the receive direction of
//! the selected role, a tagged message union, one typed send function per
//! send-direction message, and the interface's enumerations. After all
//! interfaces, the global assembly closes the set with the `Interface`,
//! `Message` and `Object` unions and their exhaustive-match forwarders.

use crate::analyzer::EnumRegistry;
use crate::ast;
use quote::{format_ident, quote};
use syn::LitInt;

mod preamble;
pub mod types;

use types::{TypeDescriptor, WireType};
pub use heck::ToUpperCamelCase;

pub trait ToIdent {
    /// Generate a sanitized rust identifier.
    /// Rust specific keywords are renamed for validity.
    fn to_ident(self) -> proc_macro2::Ident;
}

impl ToIdent for &'_ str {
    fn to_ident(self) -> proc_macro2::Ident {
        match self {
            "as" | "break" | "const" | "continue" | "crate" | "else" | "enum" | "extern"
            | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod"
            | "move" | "mut" | "pub" | "ref" | "return" | "self" | "Self" | "static" | "struct"
            | "super" | "trait" | "true" | "type" | "unsafe" | "use" | "where" | "while"
            | "async" | "await" | "dyn" | "abstract" | "become" | "box" | "do" | "final"
            | "macro" | "override" | "priv" | "typeof" | "unsized" | "virtual" | "yield"
            | "try" => format_ident!("r#{}", self),
            _ => format_ident!("{}", self),
        }
    }
}

/// Communication role a generation run targets. The role fixes, for every
/// interface alike, which message direction is decoded and which is sent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    /// Protocol initiator: sends requests, receives events.
    Client,
    /// Protocol responder: receives requests, sends events.
    Server,
}

impl Role {
    pub fn receives(self) -> ast::MessageKind {
        match self {
            Role::Client => ast::MessageKind::Event,
            Role::Server => ast::MessageKind::Request,
        }
    }

    pub fn sends(self) -> ast::MessageKind {
        match self {
            Role::Client => ast::MessageKind::Request,
            Role::Server => ast::MessageKind::Event,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "server" => Ok(Role::Server),
            _ => Err(format!("could not parse {input:?}, valid options are 'client', 'server'.")),
        }
    }
}

/// Type name of an interface value, e.g. `wl_seat` becomes `WlSeat`.
pub fn interface_type_ident(name: &str) -> proc_macro2::Ident {
    format_ident!("{}", name.to_upper_camel_case())
}

/// Type name of a generated enum, qualified by its declaring interface,
/// e.g. `wl_seat.capability` becomes `WlSeatCapability`.
pub fn enum_type_ident(interface: &str, name: &str) -> proc_macro2::Ident {
    format_ident!("{}{}", interface.to_upper_camel_case(), name.to_upper_camel_case())
}

fn message_type_ident(interface: &str) -> proc_macro2::Ident {
    format_ident!("{}Message", interface.to_upper_camel_case())
}

/// Variant name of an enum entry. Digit-only entry names are not valid
/// bare identifiers and are escaped with a leading underscore.
fn entry_ident(name: &str) -> proc_macro2::Ident {
    let name = name.to_upper_camel_case();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format_ident!("_{}", name)
    } else {
        format_ident!("{}", name)
    }
}

/// Format a constant value as hexadecimal constant.
fn format_value(value: u32) -> LitInt {
    syn::parse_str::<syn::LitInt>(&format!("{value:#x}")).unwrap()
}

fn doc(text: &Option<String>) -> Option<proc_macro2::TokenStream> {
    text.as_ref().map(|text| {
        let text = format!(" {text}");
        quote! { #[doc = #text] }
    })
}

/// Generate the statement decoding one argument off the transport, in
/// wire order. Object ids are resolved through the caller-supplied
/// resolver; a non-nullable reference that resolves to nothing is an
/// `ExpectedObject` failure, a resolved object of the wrong runtime tag
/// is `MismatchedObjectType` regardless of nullability.
fn decode_arg(arg: &ast::Arg, descriptor: &TypeDescriptor) -> proc_macro2::TokenStream {
    let name = arg.name.as_str().to_ident();
    match descriptor {
        TypeDescriptor::Scalar(wire) => {
            let next = wire.next_accessor();
            quote! { let #name = self.context.#next()?; }
        }
        TypeDescriptor::Enum { type_name, qualified, wire, bitfield } => {
            let next = wire.next_accessor();
            let raw = match wire {
                WireType::Int => quote! { self.context.#next()? as u32 },
                _ => quote! { self.context.#next()? },
            };
            if *bitfield {
                quote! { let #name = #type_name::from_bits(#raw); }
            } else {
                quote! {
                    let #name = #type_name::try_from(#raw).map_err(|value| {
                        Error::InvalidEnumValue {
                            object: self.id,
                            value,
                            enum_name: #qualified,
                        }
                    })?;
                }
            }
        }
        TypeDescriptor::Object { interface: Some(interface), interface_name, nullable } => {
            let expected = interface_name.as_deref().unwrap();
            if *nullable {
                quote! {
                    let #name = {
                        let id = self.context.next_uint()?;
                        if id == 0 {
                            None
                        } else {
                            match objects(id) {
                                Some(Object::#interface(object)) => Some(object),
                                Some(_) => {
                                    return Err(Error::MismatchedObjectType {
                                        id,
                                        expected: #expected,
                                    })
                                }
                                None => None,
                            }
                        }
                    };
                }
            } else {
                quote! {
                    let #name = {
                        let id = self.context.next_uint()?;
                        match objects(id) {
                            Some(Object::#interface(object)) => object,
                            Some(_) => {
                                return Err(Error::MismatchedObjectType {
                                    id,
                                    expected: #expected,
                                })
                            }
                            None => return Err(Error::ExpectedObject { object: self.id, id }),
                        }
                    };
                }
            }
        }
        TypeDescriptor::Object { interface: None, nullable, .. } => {
            if *nullable {
                quote! {
                    let #name = {
                        let id = self.context.next_uint()?;
                        if id == 0 {
                            None
                        } else {
                            objects(id)
                        }
                    };
                }
            } else {
                quote! {
                    let #name = {
                        let id = self.context.next_uint()?;
                        objects(id).ok_or(Error::ExpectedObject { object: self.id, id })?
                    };
                }
            }
        }
    }
}

/// Generate the statement writing one argument into the open frame.
/// Bitfields are bit-cast to their unsigned carrier, plain enums are
/// written as their integer value.
fn encode_arg(arg: &ast::Arg, descriptor: &TypeDescriptor) -> proc_macro2::TokenStream {
    let name = arg.name.as_str().to_ident();
    match descriptor {
        TypeDescriptor::Scalar(wire) => {
            let put = wire.put_accessor();
            quote! { self.context.#put(#name); }
        }
        TypeDescriptor::Enum { wire, bitfield, .. } => {
            if *bitfield {
                quote! { self.context.put_uint(#name.to_bits()); }
            } else {
                match wire {
                    WireType::Int => quote! { self.context.put_int(#name as i32); },
                    _ => quote! { self.context.put_uint(#name as u32); },
                }
            }
        }
        TypeDescriptor::Object { interface, nullable, .. } => {
            let id = match interface {
                Some(_) => quote! { object.id },
                None => quote! { object.id() },
            };
            if *nullable {
                quote! {
                    self.context.put_uint(#name.map(|object| #id).unwrap_or(0));
                }
            } else {
                quote! {
                    {
                        let object = #name;
                        self.context.put_uint(#id);
                    }
                }
            }
        }
    }
}

/// Generate the opcode dispatcher for the receive direction of the
/// selected role. The catch-all branch identifies the offending object
/// before surfacing `UnknownOpcode`; it is a diagnostic, not a recovery.
fn generate_dispatch(
    interface: &ast::Interface,
    registry: &EnumRegistry,
    role: Role,
) -> proc_macro2::TokenStream {
    let message_type = message_type_ident(&interface.name);
    let self_field = interface.name.as_str().to_ident();
    let mut arms = vec![];
    for (opcode, message) in interface.messages(role.receives()).enumerate() {
        let opcode = proc_macro2::Literal::u16_suffixed(opcode as u16);
        let variant = format_ident!("{}", message.name.to_upper_camel_case());
        let decoders: Vec<_> = message
            .args
            .iter()
            .map(|arg| decode_arg(arg, &types::resolve(&interface.name, arg, registry)))
            .collect();
        let fields: Vec<_> = message.args.iter().map(|arg| arg.name.as_str().to_ident()).collect();
        arms.push(quote! {
            #opcode => {
                #(#decoders)*
                Ok(#message_type::#variant {
                    #self_field: self.clone(),
                    #(#fields,)*
                })
            }
        });
    }
    quote! {
        pub fn dispatch(
            &self,
            objects: &dyn Fn(u32) -> Option<Object>,
            opcode: u16,
        ) -> Result<#message_type, Error> {
            match opcode {
                #(#arms)*
                _ => {
                    log::warn!(
                        "{}@{}: unknown opcode {}", Self::INTERFACE, self.id, opcode
                    );
                    Err(Error::UnknownOpcode { object: self.id, opcode })
                }
            }
        }
    }
}

/// Generate the tagged union over the receive-direction message shapes.
/// Every variant carries the originating interface value first, then the
/// resolved arguments in declaration order. Interfaces with no
/// receive-direction messages still get an (empty) message type.
fn generate_message_enum(
    interface: &ast::Interface,
    registry: &EnumRegistry,
    role: Role,
) -> proc_macro2::TokenStream {
    let type_name = interface_type_ident(&interface.name);
    let message_type = message_type_ident(&interface.name);
    let self_field = interface.name.as_str().to_ident();
    let mut variants = vec![];
    for message in interface.messages(role.receives()) {
        let variant = format_ident!("{}", message.name.to_upper_camel_case());
        let variant_doc = doc(&message.description);
        let field_names: Vec<_> =
            message.args.iter().map(|arg| arg.name.as_str().to_ident()).collect();
        let field_types: Vec<_> = message
            .args
            .iter()
            .map(|arg| types::resolve(&interface.name, arg, registry).rust_type())
            .collect();
        variants.push(quote! {
            #variant_doc
            #variant {
                #self_field: #type_name,
                #(#field_names: #field_types,)*
            }
        });
    }
    quote! {
        #[derive(Debug, Clone)]
        pub enum #message_type {
            #(#variants,)*
        }
    }
}

/// Generate one typed send function per send-direction message. The
/// frame is opened, every argument written in declaration order through
/// its wire accessor, and sealed with the object id and the message's
/// zero-based send-direction opcode, without interleaving.
fn generate_send_functions(
    interface: &ast::Interface,
    registry: &EnumRegistry,
    role: Role,
) -> Vec<proc_macro2::TokenStream> {
    let mut functions = vec![];
    for (opcode, message) in interface.messages(role.sends()).enumerate() {
        let opcode = proc_macro2::Literal::u16_suffixed(opcode as u16);
        let name = format_ident!("send_{}", message.name);
        let fn_doc = doc(&message.description);
        let descriptors: Vec<_> = message
            .args
            .iter()
            .map(|arg| types::resolve(&interface.name, arg, registry))
            .collect();
        let params: Vec<_> = message
            .args
            .iter()
            .zip(&descriptors)
            .map(|(arg, descriptor)| {
                let name = arg.name.as_str().to_ident();
                let param_type = descriptor.param_type();
                quote! { #name: #param_type }
            })
            .collect();
        let encoders: Vec<_> = message
            .args
            .iter()
            .zip(&descriptors)
            .map(|(arg, descriptor)| encode_arg(arg, descriptor))
            .collect();
        functions.push(quote! {
            #fn_doc
            pub fn #name(&self #(, #params)*) -> Result<(), Error> {
                self.context.start_write();
                #(#encoders)*
                self.context.finish_write(self.id, #opcode)
            }
        });
    }
    functions
}

/// Generate a bitfield flag type.
///
/// Only entries whose value has exactly one bit set become flag fields;
/// aggregate and zero values are narrowed out at generation time and kept
/// as doc metadata, alongside the number of padding bits that completes
/// the 32-bit carrier.
fn generate_bitfield_decl(
    interface: &ast::Interface,
    enum_def: &ast::EnumDef,
) -> proc_macro2::TokenStream {
    let name = enum_type_ident(&interface.name, &enum_def.name);
    let flags: Vec<&ast::Entry> =
        enum_def.entries.iter().filter(|entry| entry.value.count_ones() == 1).collect();
    let metadata: Vec<&ast::Entry> =
        enum_def.entries.iter().filter(|entry| entry.value.count_ones() != 1).collect();

    let padding = 32 - flags.len();
    let header = format!(
        " Bitfield of `{}.{}`: {} flags, {} padding bits.",
        interface.name,
        enum_def.name,
        flags.len(),
        padding
    );
    let metadata_docs: Vec<_> = metadata
        .iter()
        .map(|entry| {
            let text = format!(
                " `{}` ({:#x}) is not a single-bit value and is kept as metadata only.",
                entry.name, entry.value
            );
            quote! { #[doc = #text] }
        })
        .collect();

    let field_names: Vec<_> = flags.iter().map(|entry| entry.name.as_str().to_ident()).collect();
    let field_docs: Vec<_> = flags.iter().map(|entry| doc(&entry.summary)).collect();
    let masks: Vec<_> = flags.iter().map(|entry| format_value(entry.value)).collect();

    quote! {
        #[doc = #header]
        #(#metadata_docs)*
        #[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq)]
        pub struct #name {
            #(#field_docs pub #field_names: bool,)*
        }

        impl #name {
            pub fn from_bits(bits: u32) -> #name {
                #name {
                    #(#field_names: bits & #masks != 0,)*
                }
            }

            pub fn to_bits(&self) -> u32 {
                let mut bits = 0u32;
                #(if self.#field_names { bits |= #masks; })*
                bits
            }
        }
    }
}

/// Generate a closed enumeration with author-specified discriminants.
fn generate_enum_decl(
    interface: &ast::Interface,
    enum_def: &ast::EnumDef,
) -> proc_macro2::TokenStream {
    let name = enum_type_ident(&interface.name, &enum_def.name);
    let variants: Vec<_> = enum_def.entries.iter().map(|entry| entry_ident(&entry.name)).collect();
    let variant_docs: Vec<_> = enum_def.entries.iter().map(|entry| doc(&entry.summary)).collect();
    let values: Vec<_> = enum_def.entries.iter().map(|entry| format_value(entry.value)).collect();

    quote! {
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
        pub enum #name {
            #(#variant_docs #variants = #values,)*
        }

        impl TryFrom<u32> for #name {
            type Error = u32;
            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    #(#values => Ok(#name::#variants),)*
                    _ => Err(value),
                }
            }
        }

        impl From<#name> for u32 {
            fn from(value: #name) -> Self {
                value as u32
            }
        }
    }
}

fn generate_interface(
    interface: &ast::Interface,
    registry: &EnumRegistry,
    role: Role,
) -> proc_macro2::TokenStream {
    let type_name = interface_type_ident(&interface.name);
    let interface_name = &interface.name;
    let version = proc_macro2::Literal::u32_suffixed(interface.version);
    let interface_doc = doc(&interface.description);
    let dispatch = generate_dispatch(interface, registry, role);
    let message_enum = generate_message_enum(interface, registry, role);
    let send_functions = generate_send_functions(interface, registry, role);
    let enums = interface.enums.iter().map(|enum_def| {
        if enum_def.bitfield {
            generate_bitfield_decl(interface, enum_def)
        } else {
            generate_enum_decl(interface, enum_def)
        }
    });

    quote! {
        #interface_doc
        #[derive(Debug, Clone)]
        pub struct #type_name {
            pub id: u32,
            pub context: Rc<Context>,
            pub version: u32,
            pub resource: usize,
        }

        impl #type_name {
            pub const INTERFACE: &'static str = #interface_name;
            pub const VERSION: u32 = #version;

            pub fn new(id: u32, context: Rc<Context>, version: u32, resource: usize) -> #type_name {
                #type_name { id, context, version, resource }
            }

            #dispatch

            #(#send_functions)*
        }

        #message_enum

        #(#enums)*
    }
}

/// Generate the global assembly: the closed unions over interface names,
/// message shapes and interface values, with exhaustive-match forwarders.
/// Adding an interface later is a compile-time-checked change at every
/// call site, not a runtime lookup.
fn generate_assembly(protocol: &ast::Protocol) -> proc_macro2::TokenStream {
    let type_names: Vec<_> =
        protocol.interfaces.iter().map(|interface| interface_type_ident(&interface.name)).collect();
    let message_types: Vec<_> =
        protocol.interfaces.iter().map(|interface| message_type_ident(&interface.name)).collect();

    quote! {
        #[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
        pub enum Interface {
            #(#type_names,)*
        }

        #[derive(Debug, Clone)]
        pub enum Message {
            #(#type_names(#message_types),)*
        }

        #[derive(Debug, Clone)]
        pub enum Object {
            #(#type_names(#type_names),)*
        }

        impl Object {
            pub fn interface(&self) -> Interface {
                match self {
                    #(Object::#type_names(_) => Interface::#type_names,)*
                }
            }

            pub fn id(&self) -> u32 {
                match self {
                    #(Object::#type_names(object) => object.id,)*
                }
            }

            pub fn dispatch(
                &self,
                objects: &dyn Fn(u32) -> Option<Object>,
                opcode: u16,
            ) -> Result<Message, Error> {
                match self {
                    #(Object::#type_names(object) => {
                        Ok(Message::#type_names(object.dispatch(objects, opcode)?))
                    })*
                }
            }
        }
    }
}

/// Generate Rust code from a normalized schema.
///
/// The code is not formatted, use [`generate`] to get readable source.
pub fn generate_tokens(
    protocol: &ast::Protocol,
    registry: &EnumRegistry,
    role: Role,
    runtime: &syn::Path,
) -> proc_macro2::TokenStream {
    let preamble = preamble::generate(runtime, &protocol.name);
    let interfaces =
        protocol.interfaces.iter().map(|interface| generate_interface(interface, registry, role));
    let assembly = generate_assembly(protocol);
    quote! {
        #preamble

        #(#interfaces)*

        #assembly
    }
}

/// Generate formatted Rust code from a normalized schema.
pub fn generate(protocol: &ast::Protocol, role: Role, runtime: &str) -> String {
    let runtime = syn::parse_str::<syn::Path>(runtime)
        .unwrap_or_else(|err| panic!("invalid runtime module path '{runtime}': {err:?}"));
    let registry = EnumRegistry::new(protocol);
    let tokens = generate_tokens(protocol, &registry, role, &runtime);
    let syntax_tree = syn::parse2(tokens).expect("Could not parse code");
    prettyplease::unparse(&syntax_tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::ast;
    use crate::parser::parse_inline;
    use crate::test_utils::assert_contains;

    fn generate_code(code: &str, role: Role) -> String {
        let mut db = ast::SourceDatabase::new();
        let protocol = parse_inline(&mut db, "test", code.to_owned()).unwrap();
        let protocol = analyzer::analyze(vec![protocol]).unwrap();
        generate(&protocol, role, "waygen_runtime")
    }

    const GREETER: &str = r#"
        <protocol name="greeting">
          <interface name="greeter">
            <request name="hello">
              <arg name="name" type="string"/>
            </request>
            <event name="reply">
              <arg name="code" type="uint"/>
            </event>
          </interface>
        </protocol>"#;

    #[test]
    fn server_role_decodes_requests_and_sends_events() {
        let code = generate_code(GREETER, Role::Server);
        assert_contains(&code, "pub struct Greeter {");
        assert_contains(&code, "let name = self.context.next_string()?;");
        assert_contains(&code, "Ok(GreeterMessage::Hello {");
        assert_contains(&code, "pub fn send_reply(&self, code: u32) -> Result<(), Error> {");
        assert_contains(&code, "self.context.put_uint(code);");
        assert_contains(&code, "self.context.finish_write(self.id, 0u16)");
        // The receive direction carries the request, not the event.
        assert!(!code.contains("send_hello"));
        assert!(!code.contains("Reply {"));
    }

    #[test]
    fn client_role_swaps_directions() {
        let code = generate_code(GREETER, Role::Client);
        assert_contains(&code, "Ok(GreeterMessage::Reply {");
        assert_contains(&code, "pub fn send_hello(&self, name: &str) -> Result<(), Error> {");
        assert_contains(&code, "self.context.put_string(name);");
    }

    #[test]
    fn opcodes_are_positional_per_direction() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <request name="get_pointer"><arg name="id" type="new_id"/></request>
                <event name="name"><arg name="name" type="string"/></event>
                <request name="release"/>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        // Requests take opcodes 0 and 1; the interleaved event numbers
        // independently in the send direction.
        let first = code.find("0u16 => {").expect("opcode 0 arm missing");
        let pointer = code.find("let id = self.context.next_new_id()?;").expect("decode missing");
        let second = code.find("1u16 => {").expect("opcode 1 arm missing");
        let release = code.find("Ok(WlSeatMessage::Release {").expect("release arm missing");
        assert!(first < pointer && pointer < second && second < release);
        assert_contains(&code, "self.context.finish_write(self.id, 0u16)");
    }

    #[test]
    fn unknown_opcode_branch_identifies_the_object() {
        let code = generate_code(GREETER, Role::Server);
        assert_contains(&code, "log::warn!(");
        assert_contains(&code, "Err(Error::UnknownOpcode {");
    }

    #[test]
    fn empty_receive_direction_still_emits_a_message_type() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_callback">
                <event name="done"><arg name="callback_data" type="uint"/></event>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "pub enum WlCallbackMessage {}");
        assert_contains(&code, "pub fn send_done(&self, callback_data: u32)");
    }

    #[test]
    fn nullable_typed_object_decodes_to_option() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_surface"/>
              <interface name="wl_pointer">
                <request name="set_cursor">
                  <arg name="surface" type="object" interface="wl_surface" allow-null="true"/>
                  <arg name="hotspot_x" type="int"/>
                </request>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "surface: Option<WlSurface>");
        assert_contains(&code, "Some(Object::WlSurface(object)) => Some(object)");
        assert_contains(&code, "Err(Error::MismatchedObjectType {");
        // Nullable resolution never raises ExpectedObject.
        assert!(!code.contains("Error::ExpectedObject"));
        assert_contains(&code, "let hotspot_x = self.context.next_int()?;");
    }

    #[test]
    fn non_nullable_object_requires_resolution() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_surface"/>
              <interface name="wl_subsurface">
                <request name="set_parent">
                  <arg name="parent" type="object" interface="wl_surface"/>
                </request>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "None => return Err(Error::ExpectedObject { object: self.id, id })");
        assert_contains(&code, "parent: WlSurface");
    }

    #[test]
    fn bitfield_narrows_to_power_of_two_flags() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <enum name="capability" bitfield="true">
                  <entry name="pointer" value="1"/>
                  <entry name="keyboard" value="2"/>
                  <entry name="touch" value="4"/>
                  <entry name="all" value="7"/>
                </enum>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "pub struct WlSeatCapability {");
        assert_contains(&code, "pub pointer: bool");
        assert_contains(&code, "pub keyboard: bool");
        assert_contains(&code, "pub touch: bool");
        assert_contains(&code, "3 flags, 29 padding bits");
        assert_contains(&code, "`all` (0x7) is not a single-bit value");
        assert!(!code.contains("pub all"));
        assert_contains(&code, "pointer: bits & 0x1 != 0");
        assert_contains(&code, "bits |= 0x4;");
    }

    #[test]
    fn digit_named_entries_are_escaped() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_output">
                <enum name="transform">
                  <entry name="normal" value="0"/>
                  <entry name="90" value="1"/>
                  <entry name="flipped_180" value="6"/>
                </enum>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "_90 = 0x1");
        assert_contains(&code, "Normal = 0x0");
        assert_contains(&code, "Flipped180 = 0x6");
        assert_contains(&code, "0x1 => Ok(WlOutputTransform::_90)");
    }

    #[test]
    fn enum_typed_arguments_round_trip_through_their_type() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_output">
                <enum name="transform"><entry name="normal" value="0"/></enum>
                <event name="geometry">
                  <arg name="transform" type="int" enum="transform"/>
                </event>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(
            &code,
            "pub fn send_geometry(&self, transform: WlOutputTransform) -> Result<(), Error> {",
        );
        assert_contains(&code, "self.context.put_int(transform as i32);");
    }

    #[test]
    fn bitfield_arguments_are_bit_cast_on_send() {
        let code = generate_code(
            r#"<protocol name="sample">
              <interface name="wl_seat">
                <enum name="capability" bitfield="true">
                  <entry name="pointer" value="1"/>
                </enum>
                <event name="capabilities">
                  <arg name="capabilities" type="uint" enum="capability"/>
                </event>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        assert_contains(&code, "self.context.put_uint(capabilities.to_bits());");
    }

    #[test]
    fn assembly_closes_over_all_interfaces() {
        let code = generate_code(GREETER, Role::Server);
        assert_contains(&code, "pub enum Interface {\n    Greeter,\n}");
        assert_contains(&code, "pub enum Object {\n    Greeter(Greeter),\n}");
        assert_contains(&code, "pub enum Message {\n    Greeter(GreeterMessage),\n}");
        assert_contains(&code, "Object::Greeter(object) => object.id");
        assert_contains(&code, "Ok(Message::Greeter(object.dispatch(objects, opcode)?))");
    }

    #[test]
    fn registry_bind_gains_synthetic_arguments() {
        let code = generate_code(
            r#"<protocol name="wayland">
              <interface name="wl_registry">
                <request name="bind">
                  <arg name="name" type="uint"/>
                  <arg name="id" type="new_id"/>
                </request>
              </interface>
            </protocol>"#,
            Role::Server,
        );
        let bind = code.find("Ok(WlRegistryMessage::Bind {").expect("bind arm missing");
        let name = code.find("let name = self.context.next_uint()?;").expect("name decode");
        let id = code.find("let id = self.context.next_new_id()?;").expect("id decode");
        let interface =
            code.find("let interface = self.context.next_string()?;").expect("interface decode");
        let version = code.find("let version = self.context.next_uint()?;").expect("version");
        assert!(name < id && id < interface && interface < version && version < bind);
    }
}
