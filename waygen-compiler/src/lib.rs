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

//! Wayland protocol schema parser, analyzer and binding generator.

pub mod analyzer;
pub mod ast;
pub mod backends;
pub mod parser;
#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rust_output_is_deterministic() {
        // The generated code should be deterministic, to avoid unnecessary rebuilds during
        // incremental builds.
        let src = r#"
<protocol name="wayland">
  <interface name="wl_display" version="1">
    <request name="sync">
      <arg name="callback" type="new_id" interface="wl_callback"/>
    </request>
    <event name="error">
      <arg name="object_id" type="object"/>
      <arg name="code" type="uint" enum="error"/>
      <arg name="message" type="string"/>
    </event>
    <enum name="error">
      <entry name="invalid_object" value="0"/>
      <entry name="invalid_method" value="1"/>
      <entry name="no_memory" value="2"/>
    </enum>
  </interface>
  <interface name="wl_callback" version="1">
    <event name="done">
      <arg name="callback_data" type="uint"/>
    </event>
  </interface>
</protocol>
"#
        .to_owned();

        let mut sources1 = ast::SourceDatabase::new();
        let mut sources2 = ast::SourceDatabase::new();
        let mut sources3 = ast::SourceDatabase::new();

        let file1 = parser::parse_inline(&mut sources1, "foo", src.clone()).unwrap();
        let file2 = parser::parse_inline(&mut sources2, "foo", src.clone()).unwrap();
        let file3 = parser::parse_inline(&mut sources3, "foo", src).unwrap();

        let protocol1 = analyzer::analyze(vec![file1]).unwrap();
        let protocol2 = analyzer::analyze(vec![file2]).unwrap();
        let protocol3 = analyzer::analyze(vec![file3]).unwrap();

        let role = backends::rust::Role::Client;
        let result1 = backends::rust::generate(&protocol1, role, "waygen_runtime");
        let result2 = backends::rust::generate(&protocol2, role, "waygen_runtime");
        let result3 = backends::rust::generate(&protocol3, role, "waygen_runtime");

        assert_eq!(result1, result2);
        assert_eq!(result2, result3);
    }
}
