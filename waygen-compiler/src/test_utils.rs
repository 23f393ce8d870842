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

#![allow(dead_code)]

//! Helpers for testing generated code.

/// Format a rust source snippet so that tests compare normalized text.
pub fn format_rust(input: &str) -> String {
    let syntax_tree = syn::parse_file(input).expect("could not parse input");
    prettyplease::unparse(&syntax_tree)
}

/// Assert that generated source contains the expected fragment, with a
/// readable failure message showing the full source.
#[track_caller]
pub fn assert_contains(source: &str, fragment: &str) {
    assert!(
        source.contains(fragment),
        "expected fragment not found\nfragment:\n{fragment}\nsource:\n{source}"
    );
}
