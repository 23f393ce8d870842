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

use quote::quote;

/// Generate the file preamble.
///
/// The runtime transport module is not hardcoded: the caller names it on
/// the command line and the generated file imports the `Context`, `Error`
/// and `Fd` definitions from there.
pub fn generate(runtime: &syn::Path, protocol_name: &str) -> proc_macro2::TokenStream {
    let module_doc_string = format!(" @generated rust bindings from the {protocol_name} schema.");
    quote! {
        #![doc = #module_doc_string]

        use std::rc::Rc;
        use #runtime::{Context, Error, Fd};
    }
}
