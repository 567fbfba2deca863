//! Plain-text rendering of a [`RunResult`].

use std::fmt::Write;

use similar::{ChangeTag, TextDiff};

use crate::mutants::{Mutant, MutantId, MutantStatus, Operator};
use crate::operators::remediation_hint;
use crate::scorer::RunResult;

const WIDTH: usize = 70;

/// `Testing <id> (<operator>)... <VERDICT>`
pub fn progress_line(id: MutantId, operator: Operator, status: MutantStatus) -> String {
    format!("Testing {id} ({operator})... {}", status.label())
}

pub fn render_text(result: &RunResult) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);

    let _ = writeln!(out, "\n{heavy}\nMUTATION TESTING REPORT\n{heavy}\n");
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "   Total Mutants: {}", result.total_mutants);
    let _ = writeln!(out, "   Killed: {}", result.killed);
    let _ = writeln!(out, "   Survived: {}", result.survived);
    let _ = writeln!(out, "   Timeout: {}", result.timeout);
    let _ = writeln!(out, "   Errors: {}", result.errors);
    if result.not_run > 0 {
        let _ = writeln!(out, "   Not run: {}", result.not_run);
    }
    let _ = writeln!(out, "   Mutation Score: {:.2}%\n", result.mutation_score * 100.0);
    let _ = writeln!(out, "{}\n", result.tier().verdict());

    if result.interrupted {
        let _ = writeln!(out, "Run was interrupted; figures cover executed mutants only.\n");
    }

    if !result.survived_mutants.is_empty() {
        let _ = writeln!(out, "Survived Mutants (test weaknesses):\n{light}");
        for m in &result.survived_mutants {
            let _ = writeln!(out, "\n{} - {}", m.id, m.operator);
            let _ = writeln!(out, "   File: {}:{}", m.file_path.display(), m.line_number);
            let _ = writeln!(out, "   Original: {}", m.original_text);
            let _ = writeln!(out, "   Mutated:  {}", m.mutated_text);
            let _ = writeln!(out, "   Hint: {}", remediation_hint(m.operator));
        }
        let _ = writeln!(out);
    }

    let weak: Vec<_> = result.operator_stats.iter().filter(|s| s.survived > 0).collect();
    if !weak.is_empty() {
        let _ = writeln!(out, "Recommendations:\n{light}");
        for stats in weak {
            let _ = writeln!(out, "\n{}:", stats.operator);
            let _ = writeln!(
                out,
                "   Score: {:.1}% ({}/{} killed)",
                stats.kill_ratio * 100.0,
                stats.killed,
                stats.killed + stats.survived
            );
            let _ = writeln!(out, "   {}", remediation_hint(stats.operator));
        }
        let _ = writeln!(out);
    }

    if result.timeout > 0 {
        let _ = writeln!(
            out,
            "{} mutant(s) timed out; the suite may be too slow for practical mutation testing.\n",
            result.timeout
        );
    }

    if !result.generation_errors.is_empty() {
        let _ = writeln!(out, "Files skipped:");
        for issue in &result.generation_errors {
            let _ = writeln!(out, "   {}: {}", issue.file.display(), issue.message);
        }
        let _ = writeln!(out);
    }

    if !result.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for warning in &result.warnings {
            let _ = writeln!(out, "   {warning}");
        }
        let _ = writeln!(out);
    }

    out
}

/// Changed lines only, prefixed `- ` / `+ `.
pub fn generate_diff(original: &str, mutated: &str) -> String {
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => output.push_str(&format!("- {change}")),
            ChangeTag::Insert => output.push_str(&format!("+ {change}")),
            ChangeTag::Equal => {}
        }
    }
    output
}

/// Diff of the mutant's target line, newline-terminated.
pub fn mutant_diff(m: &Mutant) -> String {
    generate_diff(&format!("{}\n", m.source_line), &format!("{}\n", m.mutated_line()))
}
