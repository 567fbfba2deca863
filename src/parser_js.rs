use tree_sitter::{Node, Tree};

use crate::generator::{SourceLanguage, node_text, site_at};
use crate::mutants::MutationSite;
use crate::operators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

/// JavaScript and TypeScript share one walker; only the grammar differs.
pub struct JsLanguage {
    pub dialect: JsDialect,
}

impl SourceLanguage for JsLanguage {
    fn grammar(&self) -> tree_sitter::Language {
        match self.dialect {
            JsDialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            JsDialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            JsDialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn find_mutable_nodes(&self, tree: &Tree, source: &str) -> Vec<MutationSite> {
        let mut sites = Vec::new();
        walk_node(tree.root_node(), source, &mut sites);
        sites
    }
}

fn walk_node(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    if should_skip_node(node, source) {
        return;
    }

    match node.kind() {
        "binary_expression" => collect_binary_mutations(node, source, sites),
        "unary_expression" => collect_negation_mutations(node, source, sites),
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

fn should_skip_node(node: Node, source: &str) -> bool {
    if node.kind() == "call_expression" {
        if let Some(func) = node.child_by_field_name("function") {
            if node_text(func, source).starts_with("console.") {
                return true;
            }
        }
    }
    // 'use strict' and other directive strings
    if node.kind() == "expression_statement" && node.child_count() == 1 {
        if let Some(child) = node.child(0) {
            if child.kind() == "string" {
                return true;
            }
        }
    }
    false
}

fn collect_binary_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let Some(op_node) = node.child_by_field_name("operator") else {
        return;
    };
    let op_text = node_text(op_node, source);

    // String concatenation
    if op_text == "+" {
        if let Some(left) = node.child_by_field_name("left") {
            if left.kind() == "string" || left.kind() == "template_string" {
                return;
            }
        }
    }

    if let Some(op) = operators::binary(op_text, "!==") {
        sites.push(site_at(op_node, op, op_text));
    }
}

fn collect_negation_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let Some(op_node) = node.child_by_field_name("operator") else {
        return;
    };
    if op_node.kind() != "!" {
        return;
    }
    if let Some(operand) = node.child_by_field_name("argument") {
        sites.push(MutationSite {
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            operator: crate::mutants::Operator::Negation,
            original: node_text(node, source).to_string(),
            replacement: node_text(operand, source).to_string(),
        });
    }
}

fn collect_return_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    // return_statement children: "return" [expression] [";"]
    let mut expr = None;
    let child_count = node.child_count();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            if child.kind() != "return" && child.kind() != ";" {
                expr = Some(child);
                break;
            }
        }
    }

    let Some(expr) = expr else {
        return;
    };
    if !matches!(expr.kind(), "true" | "false" | "number") {
        return;
    }
    let literal = node_text(expr, source);
    if let Some(op) = operators::return_literal(literal) {
        sites.push(site_at(expr, op, literal));
    }
}
