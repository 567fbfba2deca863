use console::Style;

use crate::mutants::{Mutant, MutantId, MutantStatus, Operator};
use crate::report;
use crate::scorer::RunResult;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_warning(msg: &str) {
    let style = Style::new().yellow().bold();
    eprintln!("{} {}", style.apply_to("!"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

fn verdict_style(status: MutantStatus) -> Style {
    match status {
        MutantStatus::Killed => Style::new().green(),
        MutantStatus::Survived => Style::new().red().bold(),
        MutantStatus::Timeout => Style::new().yellow(),
        MutantStatus::Error => Style::new().magenta(),
        MutantStatus::Pending => Style::new().dim(),
    }
}

pub fn print_progress(id: MutantId, operator: Operator, status: MutantStatus) {
    let line = report::progress_line(id, operator, status);
    let label = status.label();
    let head = &line[..line.len() - label.len()];
    println!("{}{}", head, verdict_style(status).apply_to(label));
}

pub fn print_report(result: &RunResult) {
    print!("{}", report::render_text(result));
}

pub fn print_manifest(mutants: &[Mutant]) {
    let dim = Style::new().dim();
    let op_style = Style::new().magenta();
    for m in mutants {
        println!(
            "{} {}:{}:{} {} {} → {}",
            Style::new().cyan().bold().apply_to(m.id),
            m.file_path.display(),
            m.line_number,
            m.column,
            dim.apply_to(format!("[{}]", m.operator)),
            op_style.apply_to(&m.original_text),
            op_style.apply_to(&m.mutated_text),
        );
    }
}

pub fn print_mutant_detail(m: &Mutant) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{} {}:{} [{}] {}",
        ref_style.apply_to(m.id),
        m.file_path.display(),
        m.line_number,
        m.operator,
        verdict_style(m.status).apply_to(m.status.label()),
    );
    println!();

    for line in report::mutant_diff(m).lines() {
        if line.starts_with('-') {
            println!("  {}", Style::new().red().apply_to(line));
        } else if line.starts_with('+') {
            println!("  {}", Style::new().green().apply_to(line));
        }
    }

    if let Some(detail) = &m.error_detail {
        println!();
        for line in detail.lines() {
            println!("  {}", dim.apply_to(line));
        }
    }
    if m.status == MutantStatus::Survived {
        println!();
        println!("  {}", dim.apply_to(crate::operators::remediation_hint(m.operator)));
    }
}

pub fn print_status(result: &RunResult) {
    println!(
        "Last run: {} mutants, {} killed, {} survived, {} timeout, {} errors ({:.1}% score)",
        result.total_mutants,
        result.killed,
        result.survived,
        result.timeout,
        result.errors,
        result.mutation_score * 100.0,
    );

    if result.survived > 0 {
        println!();
        for m in &result.survived_mutants {
            let ref_style = Style::new().cyan().bold();
            println!(
                "  {} {}:{} [{}] {} → {}",
                ref_style.apply_to(m.id),
                m.file_path.display(),
                m.line_number,
                m.operator,
                m.original_text,
                m.mutated_text,
            );
        }
        println!();
        println!("Use `mutscore show mutant-<n>` for details on a specific mutant.");
    }
}
