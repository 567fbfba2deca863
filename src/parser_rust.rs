use tree_sitter::{Node, Tree};

use crate::generator::{SourceLanguage, node_text, site_at};
use crate::mutants::{MutationSite, Operator};
use crate::operators;

pub struct RustLanguage;

impl SourceLanguage for RustLanguage {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn find_mutable_nodes(&self, tree: &Tree, source: &str) -> Vec<MutationSite> {
        let mut sites = Vec::new();
        walk_node(tree.root_node(), source, &mut sites);
        sites
    }
}

fn walk_node(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    // #[cfg(test)] modules and #[test] functions are test code
    if is_test_item(node, source) {
        return;
    }

    match node.kind() {
        "binary_expression" => collect_binary_mutations(node, source, sites),
        "unary_expression" => collect_negation_mutations(node, source, sites),
        "return_expression" => collect_return_mutations(node, source, sites),
        "function_item" => collect_tail_literal(node, source, sites),
        _ => {}
    }

    let child_count = node.child_count();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            walk_node(child, source, sites);
        }
    }
}

fn is_test_item(node: Node, source: &str) -> bool {
    if !matches!(node.kind(), "mod_item" | "function_item") {
        return false;
    }
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "attribute_item" {
            break;
        }
        let text = node_text(sibling, source);
        if text.contains("cfg(test)") || text == "#[test]" || text.ends_with("::test]") {
            return true;
        }
        prev = sibling.prev_sibling();
    }
    false
}

fn collect_binary_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let Some(op_node) = node.child_by_field_name("operator") else {
        return;
    };
    let op_text = node_text(op_node, source);
    if let Some(op) = operators::binary(op_text, "!=") {
        sites.push(site_at(op_node, op, op_text));
    }
}

fn collect_negation_mutations(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    // unary_expression: ! operand (also `-x` and `*x`, which are not mutated)
    let Some(op_node) = node.child(0) else {
        return;
    };
    if op_node.kind() != "!" {
        return;
    }
    if let Some(operand) = node.child(1) {
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
    // return_expression: "return" expr?
    if let Some(expr) = node.child(1) {
        push_literal_site(expr, source, sites);
    }
}

/// The last expression of a function body is an implicit return.
fn collect_tail_literal(node: Node, source: &str, sites: &mut Vec<MutationSite>) {
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    let tail = body
        .named_children(&mut cursor)
        .filter(|child| !matches!(child.kind(), "line_comment" | "block_comment"))
        .last();
    if let Some(tail) = tail {
        push_literal_site(tail, source, sites);
    }
}

fn push_literal_site(expr: Node, source: &str, sites: &mut Vec<MutationSite>) {
    if !matches!(expr.kind(), "boolean_literal" | "integer_literal" | "float_literal") {
        return;
    }
    let literal = node_text(expr, source);
    if let Some(op) = operators::return_literal(literal) {
        sites.push(site_at(expr, op, literal));
    }
}
