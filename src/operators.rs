/// Mutation operator tables shared by every language.
/// Each trigger maps to exactly one mutated form.
use crate::mutants::Operator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOp {
    pub operator: Operator,
    pub replacement: String,
}

impl MutationOp {
    fn new(operator: Operator, replacement: &str) -> Self {
        MutationOp { operator, replacement: replacement.to_string() }
    }
}

/// `<` and `>` widen to include equality.
pub fn conditional_boundary(op_text: &str) -> Option<MutationOp> {
    match op_text {
        "<" => Some(MutationOp::new(Operator::ConditionalBoundary, "<=")),
        ">" => Some(MutationOp::new(Operator::ConditionalBoundary, ">=")),
        _ => None,
    }
}

pub fn arithmetic(op_text: &str) -> Option<MutationOp> {
    match op_text {
        "+" => Some(MutationOp::new(Operator::Arithmetic, "-")),
        "-" => Some(MutationOp::new(Operator::Arithmetic, "+")),
        "*" => Some(MutationOp::new(Operator::Arithmetic, "/")),
        _ => None,
    }
}

/// Symbolic and keyword (Python) forms.
pub fn logical(op_text: &str) -> Option<MutationOp> {
    match op_text {
        "&&" => Some(MutationOp::new(Operator::Logical, "||")),
        "||" => Some(MutationOp::new(Operator::Logical, "&&")),
        "and" => Some(MutationOp::new(Operator::Logical, "or")),
        "or" => Some(MutationOp::new(Operator::Logical, "and")),
        _ => None,
    }
}

/// Equality becomes the language's inequality form (`!==` in JS/TS,
/// `!=` elsewhere).
pub fn comparison(op_text: &str, inequality: &str) -> Option<MutationOp> {
    match op_text {
        "==" | "===" => Some(MutationOp::new(Operator::Comparison, inequality)),
        _ => None,
    }
}

/// Any binary-operator trigger in the closed set.
pub fn binary(op_text: &str, inequality: &str) -> Option<MutationOp> {
    conditional_boundary(op_text)
        .or_else(|| arithmetic(op_text))
        .or_else(|| logical(op_text))
        .or_else(|| comparison(op_text, inequality))
}

/// Literal return values: booleans flip, numbers are incremented by one.
pub fn return_literal(literal: &str) -> Option<MutationOp> {
    let replacement = match literal.trim() {
        "true" => "false".to_string(),
        "false" => "true".to_string(),
        "True" => "False".to_string(),
        "False" => "True".to_string(),
        other => increment_numeric_literal(other)?,
    };
    Some(MutationOp { operator: Operator::Return, replacement })
}

const NUMERIC_SUFFIXES: &[&str] = &[
    "", "n", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128",
    "isize", "f32", "f64",
];

/// Increment a decimal literal by one, keeping any type suffix.
/// Hex, octal, binary and exponent forms are left alone.
pub fn increment_numeric_literal(text: &str) -> Option<String> {
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if !NUMERIC_SUFFIXES.contains(&suffix) {
        return None;
    }
    let digits: String = number.chars().filter(|c| *c != '_').collect();
    if digits.contains('.') {
        if suffix == "n" {
            return None;
        }
        let value: f64 = digits.parse().ok()?;
        let mut bumped = format!("{}", value + 1.0);
        if !bumped.contains('.') {
            bumped.push_str(".0");
        }
        return Some(format!("{bumped}{suffix}"));
    }
    // legacy octal in JS
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    let value: u128 = digits.parse().ok()?;
    Some(format!("{}{suffix}", value.checked_add(1)?))
}

/// One-line advice for a surviving mutant of the given kind.
pub fn remediation_hint(operator: Operator) -> &'static str {
    match operator {
        Operator::ConditionalBoundary => {
            "Add boundary value tests (e.g. equal operands, 0, 1, -1, max values)"
        }
        Operator::Arithmetic => "Verify arithmetic results with several distinct input values",
        Operator::Logical => "Test all combinations of the boolean conditions",
        Operator::Comparison => "Test equality and inequality explicitly",
        Operator::Negation => "Test both the positive and the negative case",
        Operator::Return => "Assert exact return values, not just truthiness",
    }
}
