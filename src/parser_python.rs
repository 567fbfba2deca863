use tree_sitter::{Node, Tree};

use crate::generator::{SourceLanguage, node_text, site_at};
use crate::mutants::{MutationSite, Operator};
use crate::operators;

pub struct PythonLanguage;

impl SourceLanguage for PythonLanguage {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn find_mutable_nodes(&self, tree: &Tree, source: &str) -> Vec<MutationSite> {
        let mut sites = Vec::new();
        walk_node(tree.root_node(), source, &mut sites);
        sites
    }
}

fn walk_node(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    // Skip nodes that are noise for business logic testing
    if should_skip_node(node, source) {
        return;
    }

    match node.kind() {
        "comparison_operator" | "boolean_operator" | "binary_operator" => {
            collect_operator_tokens(node, source, sites);
        }
        "not_operator" => collect_not_mutations(node, source, sites),
        "return_statement" => collect_return_mutations(node, source, sites),
        _ => {}
    }

    let child_count = node.child_count();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            walk_node(child, source, sites);
        }
    }
}

/// Skip print/logging calls and docstrings.
fn should_skip_node(node: Node, source: &str) -> bool {
    if node.kind() == "call" {
        if let Some(func) = node.child(0) {
            let text = node_text(func, source);
            if text == "print" || text.starts_with("logging.") || text.starts_with("log.") {
                return true;
            }
        }
    }
    if node.kind() == "expression_statement" && node.child_count() == 1 {
        if let Some(child) = node.child(0) {
            if child.kind() == "string" {
                return true;
            }
        }
    }
    false
}

/// Operator tokens are anonymous children of the expression node. A chained
/// comparison (`a < b < c`) yields one site per token.
fn collect_operator_tokens(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let child_count = node.child_count();
    for i in 0..child_count {
        let Some(child) = node.child(i) else {
            continue;
        };
        if child.is_named() {
            continue;
        }
        let op_text = node_text(child, source);

        if op_text == "+" {
            if let Some(left) = node.child(0) {
                if left.kind() == "string" || left.kind() == "concatenated_string" {
                    continue;
                }
            }
        }

        if let Some(op) = operators::binary(op_text, "!=") {
            sites.push(site_at(child, op, op_text));
        }
    }
}

fn collect_not_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let Some(not_kw) = node.child(0) else {
        return;
    };
    if not_kw.kind() != "not" {
        return;
    }
    if let Some(operand) = node.child_by_field_name("argument").or_else(|| node.child(1)) {
        sites.push(MutationSite {
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            operator: Operator::Negation,
            original: node_text(node, source).to_string(),
            replacement: node_text(operand, source).to_string(),
        });
    }
}

fn collect_return_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    if node.child_count() < 2 {
        return;
    }
    let Some(expr) = node.child(1) else {
        return;
    };
    if !matches!(expr.kind(), "true" | "false" | "integer" | "float") {
        return;
    }
    let literal = node_text(expr, source);
    if let Some(op) = operators::return_literal(literal) {
        sites.push(site_at(expr, op, literal));
    }
}
