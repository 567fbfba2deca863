//! Mutant generation.
//!
//! Each supported language implements [`SourceLanguage`]: parse text into a
//! tree-sitter tree, then walk it for mutable constructs. Everything after
//! generation (execution, scoring, reporting) is language-agnostic.

use std::path::{Component, Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::Language;
use crate::error::GenerateError;
use crate::mutants::{Mutant, MutantId, MutationSite};

pub trait SourceLanguage {
    fn grammar(&self) -> tree_sitter::Language;

    /// Pre-order walk of the tree, one site per syntactic match.
    fn find_mutable_nodes(&self, tree: &Tree, source: &str) -> Vec<MutationSite>;

    fn parse(&self, text: &str) -> Result<Tree, GenerateError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| GenerateError::Grammar(e.to_string()))?;
        let tree = parser.parse(text, None).ok_or(GenerateError::Parse)?;
        if let Some(line) = first_error_line(tree.root_node()) {
            return Err(GenerateError::Syntax(line));
        }
        Ok(tree)
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    Some(node.start_position().row + 1)
}

/// Hands out run-wide monotonically increasing ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> MutantId {
        let id = MutantId(self.next);
        self.next += 1;
        id
    }
}

/// A file's text and its syntax tree. Never modified.
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub text: String,
    pub tree: Tree,
}

impl SourceUnit {
    pub fn load(path: &Path) -> Result<SourceUnit, GenerateError> {
        if is_test_path(path) {
            return Err(GenerateError::TestFile(path.to_path_buf()));
        }
        let language = crate::detect_language(path)
            .ok_or_else(|| GenerateError::UnsupportedLanguage(path.to_path_buf()))?;
        let text = std::fs::read_to_string(path).map_err(|source| GenerateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_text(path, language, text)
    }

    pub fn from_text(path: &Path, language: Language, text: String) -> Result<SourceUnit, GenerateError> {
        let tree = language.source_language().parse(&text)?;
        Ok(SourceUnit {
            path: path.to_path_buf(),
            language,
            text,
            tree,
        })
    }

    /// Mutants in front-to-back source order.
    pub fn mutants(&self, ids: &mut IdAllocator) -> Vec<Mutant> {
        let mut sites = self.language.source_language().find_mutable_nodes(&self.tree, &self.text);
        // Substitution is line-scoped, so a site must sit on one line.
        sites.retain(|s| !s.original.contains('\n') && !s.replacement.contains('\n'));
        sites.sort_by_key(|s| (s.line, s.column));

        let lines: Vec<&str> = self
            .text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();

        sites
            .into_iter()
            .map(|site| {
                let source_line = lines.get(site.line - 1).copied().unwrap_or_default();
                Mutant::new(ids.next_id(), self.path.clone(), site, source_line)
            })
            .collect()
    }
}

/// Load, parse and walk one file.
pub fn generate(path: &Path, ids: &mut IdAllocator) -> Result<Vec<Mutant>, GenerateError> {
    let unit = SourceUnit::load(path)?;
    Ok(unit.mutants(ids))
}

/// Test sources are never mutated.
pub fn is_test_path(path: &Path) -> bool {
    // A `tests`/`test` ancestor counts unless a source root (`src`, `lib`)
    // sits below it, as in `~/test/project/src/app.js`.
    let mut in_test_dir = false;
    for component in path.parent().into_iter().flat_map(Path::components) {
        let Component::Normal(name) = component else {
            continue;
        };
        if name == "__tests__" || name == "__mocks__" {
            return true;
        }
        if name == "tests" || name == "test" {
            in_test_dir = true;
        } else if name == "src" || name == "lib" {
            in_test_dir = false;
        }
    }
    if in_test_dir {
        return true;
    }

    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    if name.contains(".test.") || name.contains(".spec.") {
        return true;
    }
    name.ends_with(".py") && (name.starts_with("test_") || name.ends_with("_test.py"))
}

pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

pub(crate) fn site_at(node: Node, operator: crate::operators::MutationOp, original: &str) -> MutationSite {
    MutationSite {
        line: node.start_position().row + 1,
        column: node.start_position().column + 1,
        operator: operator.operator,
        original: original.to_string(),
        replacement: operator.replacement,
    }
}
