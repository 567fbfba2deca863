use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::mutants::{Mutant, MutantStatus, Operator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStats {
    pub operator: Operator,
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timeout: usize,
    pub errors: usize,
    /// `killed / (killed + survived)`, 0 when neither occurred.
    pub kill_ratio: f64,
}

impl OperatorStats {
    pub fn survival_rate(&self) -> f64 {
        let decided = self.killed + self.survived;
        if decided == 0 { 0.0 } else { self.survived as f64 / decided as f64 }
    }
}

/// A file that contributed no mutants, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationIssue {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub total_mutants: usize,
    pub killed: usize,
    pub survived: usize,
    pub timeout: usize,
    pub errors: usize,
    pub mutation_score: f64,
    pub survived_mutants: Vec<Mutant>,
    #[serde(default)]
    pub operator_stats: Vec<OperatorStats>,
    /// Mutants never executed because the run was cancelled.
    #[serde(default)]
    pub not_run: usize,
    #[serde(default)]
    pub interrupted: bool,
    /// Input files that parsed and produced a (possibly empty) mutant list.
    #[serde(default)]
    pub files_generated: usize,
    #[serde(default)]
    pub generation_errors: Vec<GenerationIssue>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub mutants: Vec<Mutant>,
}

impl RunResult {
    pub fn tier(&self) -> ScoreTier {
        ScoreTier::from_score(self.mutation_score)
    }

    pub fn find(&self, id: crate::mutants::MutantId) -> Option<&Mutant> {
        self.mutants
            .iter()
            .chain(self.survived_mutants.iter())
            .find(|m| m.id == id)
    }
}

/// `killed / (total - errors - timeouts)`, or 0 when nothing is left to
/// divide by.
pub fn mutation_score(killed: usize, total: usize, errors: usize, timeouts: usize) -> f64 {
    let denominator = total.saturating_sub(errors).saturating_sub(timeouts);
    if denominator == 0 {
        0.0
    } else {
        killed as f64 / denominator as f64
    }
}

/// Aggregate terminal verdicts. Pending mutants are counted as `not_run`
/// and kept out of every other figure.
pub fn score(mutants: &[Mutant]) -> RunResult {
    let mut ordered = mutants.to_vec();
    ordered.sort_by_key(|m| m.id);

    let count = |status: MutantStatus| ordered.iter().filter(|m| m.status == status).count();
    let killed = count(MutantStatus::Killed);
    let survived = count(MutantStatus::Survived);
    let timeout = count(MutantStatus::Timeout);
    let errors = count(MutantStatus::Error);
    let not_run = count(MutantStatus::Pending);
    let total_mutants = ordered.len() - not_run;

    let survived_mutants = ordered
        .iter()
        .filter(|m| m.status == MutantStatus::Survived)
        .cloned()
        .collect();

    RunResult {
        total_mutants,
        killed,
        survived,
        timeout,
        errors,
        mutation_score: mutation_score(killed, total_mutants, errors, timeout),
        survived_mutants,
        operator_stats: operator_stats(&ordered),
        not_run,
        interrupted: false,
        files_generated: 0,
        generation_errors: Vec::new(),
        warnings: Vec::new(),
        duration_ms: 0,
        mutants: ordered,
    }
}

/// Per-operator tallies in the fixed operator order, omitting operators
/// with no executed mutants.
pub fn operator_stats(mutants: &[Mutant]) -> Vec<OperatorStats> {
    Operator::ALL
        .iter()
        .filter_map(|&operator| {
            let of_kind: Vec<&Mutant> = mutants
                .iter()
                .filter(|m| m.operator == operator && m.status.is_terminal())
                .collect();
            if of_kind.is_empty() {
                return None;
            }
            let count = |status| of_kind.iter().filter(|m| m.status == status).count();
            let killed = count(MutantStatus::Killed);
            let survived = count(MutantStatus::Survived);
            let decided = killed + survived;
            Some(OperatorStats {
                operator,
                total: of_kind.len(),
                killed,
                survived,
                timeout: count(MutantStatus::Timeout),
                errors: count(MutantStatus::Error),
                kill_ratio: if decided == 0 { 0.0 } else { killed as f64 / decided as f64 },
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreTier {
    pub fn from_score(score: f64) -> Self {
        let pct = score * 100.0;
        if pct >= 80.0 {
            ScoreTier::Excellent
        } else if pct >= 60.0 {
            ScoreTier::Good
        } else if pct >= 40.0 {
            ScoreTier::Fair
        } else {
            ScoreTier::Poor
        }
    }

    pub fn verdict(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Excellent! Your tests are high quality.",
            ScoreTier::Good => "Good, but there's room for improvement.",
            ScoreTier::Fair => "Fair. Consider adding more test cases.",
            ScoreTier::Poor => "Poor. Your tests need significant improvement.",
        }
    }
}
