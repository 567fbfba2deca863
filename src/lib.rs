pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod copy_tree;
pub mod error;
pub mod executor;
pub mod generator;
pub mod mutants;
pub mod operators;
pub mod output;
pub mod parser_js;
pub mod parser_python;
pub mod parser_rust;
pub mod report;
pub mod safety;
pub mod scorer;
pub mod state;

use generator::SourceLanguage;
use parser_js::{JsDialect, JsLanguage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    pub fn source_language(self) -> Box<dyn SourceLanguage> {
        match self {
            Language::Python => Box::new(parser_python::PythonLanguage),
            Language::Rust => Box::new(parser_rust::RustLanguage),
            Language::JavaScript => Box::new(JsLanguage { dialect: JsDialect::JavaScript }),
            Language::TypeScript => Box::new(JsLanguage { dialect: JsDialect::TypeScript }),
            Language::Tsx => Box::new(JsLanguage { dialect: JsDialect::Tsx }),
        }
    }
}

pub fn detect_language(path: &std::path::Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "py" => Some(Language::Python),
        "rs" => Some(Language::Rust),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "ts" | "mts" | "cts" => Some(Language::TypeScript),
        "tsx" | "jsx" => Some(Language::Tsx),
        _ => None,
    }
}
