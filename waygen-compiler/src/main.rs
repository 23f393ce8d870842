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

//! Wayland protocol schema compiler.

use argh::FromArgs;
use codespan_reporting::term::{self, termcolor};

use waygen_compiler::backends::rust::Role;
use waygen_compiler::{analyzer, ast, backends, parser};

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    JSON,
    Rust,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "json" => Ok(Self::JSON),
            "rust" => Ok(Self::Rust),
            _ => Err(format!("could not parse {input:?}, valid options are 'json', 'rust'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Wayland protocol schema analyzer and binding generator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::Rust")]
    /// generate output in this format ("json", "rust").
    /// The output will be printed on stdout in all cases.
    /// The input files are the source protocol XML files.
    output_format: OutputFormat,

    #[argh(option, default = "Role::Client")]
    /// generate bindings for this communication role ("client", "server").
    /// The role selects which message direction is decoded and which is sent.
    role: Role,

    #[argh(option, default = "String::from(\"waygen_runtime\")")]
    /// module path of the runtime support crate imported by the generated
    /// code, e.g. "waygen_runtime" or "crate::runtime".
    runtime: String,

    #[argh(positional)]
    /// input files.
    input_files: Vec<String>,
}

fn generate_backend(opt: &Opt) -> Result<(), String> {
    let mut sources = ast::SourceDatabase::new();
    let mut documents = vec![];
    for input_file in &opt.input_files {
        match parser::parse_file(&mut sources, input_file) {
            Ok(document) => documents.push(document),
            Err(err) => {
                let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Always);
                let config = term::Config::default();
                term::emit(&mut writer.lock(), &config, &sources, &err)
                    .expect("Could not print error");
                return Err(String::from("Error while parsing input"));
            }
        }
    }

    let protocol = match analyzer::analyze(documents) {
        Ok(protocol) => protocol,
        Err(diagnostics) => {
            diagnostics
                .emit(
                    &sources,
                    &mut termcolor::StandardStream::stderr(termcolor::ColorChoice::Always).lock(),
                )
                .expect("Could not print analyzer diagnostics");
            return Err(String::from("Analysis failed"));
        }
    };

    match opt.output_format {
        OutputFormat::JSON => {
            println!("{}", backends::json::generate(&protocol)?);
            Ok(())
        }
        OutputFormat::Rust => {
            println!("{}", backends::rust::generate(&protocol, opt.role, &opt.runtime));
            Ok(())
        }
    }
}

fn main() -> Result<(), String> {
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("waygenc {}\nCopyright (C) 2026 Google LLC", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if opt.input_files.is_empty() {
        return Err("No input file is specified".to_owned());
    }

    generate_backend(&opt)
}
