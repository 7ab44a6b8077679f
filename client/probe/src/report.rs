//! Console rendering of request and suite results.
//!
//! Everything writes to an `io::Write` so the same code feeds stdout and tests.

use std::io::{self, Write};

use crate::{error::ProbeError, invoker::ResponseRecord};

pub const RULE: &str = "==================================================";

pub fn mark(success: bool) -> &'static str {
    if success {
        "PASS"
    } else {
        "FAIL"
    }
}

pub fn percent(successes: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Tally {
    cases: Vec<CaseOutcome>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, success: bool) {
        self.cases.push(CaseOutcome {
            name: name.into(),
            success,
        });
    }

    pub fn cases(&self) -> &[CaseOutcome] {
        &self.cases
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn successes(&self) -> usize {
        self.cases.iter().filter(|case| case.success).count()
    }

    pub fn failures(&self) -> usize {
        self.total() - self.successes()
    }

    pub fn rate(&self) -> f64 {
        percent(self.successes(), self.total())
    }

    pub fn rate_line(&self) -> String {
        format!(
            "success rate: {}/{} ({:.1}%)",
            self.successes(),
            self.total(),
            self.rate()
        )
    }

    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for case in &self.cases {
            writeln!(out, "{}: {}", case.name, mark(case.success))?;
        }
        writeln!(out)?;
        writeln!(out, "{}", self.rate_line())
    }

    pub fn into_cases(self) -> Vec<CaseOutcome> {
        self.cases
    }
}

pub fn describe_response<W: Write>(out: &mut W, record: &ResponseRecord) -> io::Result<()> {
    writeln!(out, "url: {}", record.url)?;
    writeln!(out, "status: {}", record.status)?;
    if record.body.is_empty() {
        return Ok(());
    }

    let Some(json) = &record.json else {
        writeln!(out, "response text: {}", record.body)?;
        return Ok(());
    };
    let pretty = serde_json::to_string_pretty(json).unwrap_or_else(|_| record.body.clone());
    writeln!(out, "response: {pretty}")?;

    match record.api() {
        Some(api) if api.success => {
            writeln!(out, "success")?;
            if let Some(revenue) = api.revenue() {
                writeln!(out, "revenue: {revenue}")?;
            }
        }
        Some(api) => {
            let message = api.message.as_deref().unwrap_or("unknown error");
            writeln!(out, "failed: {message}")?;
        }
        None => {}
    }
    Ok(())
}

pub fn describe_failure<W: Write>(out: &mut W, err: &ProbeError) -> io::Result<()> {
    writeln!(out, "request failed ({}): {err}", err.transport_kind())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteOutcome {
    Check(bool),
    /// Repeated installs for one device; only the first attempt must pass.
    Dedup(Vec<bool>),
    Named(Vec<CaseOutcome>),
    /// The comparison is informational.
    Pair { primary: bool, comparison: bool },
}

impl SuiteOutcome {
    pub fn passed(&self) -> bool {
        match self {
            SuiteOutcome::Check(success) => *success,
            SuiteOutcome::Dedup(attempts) => attempts.first().copied().unwrap_or(false),
            SuiteOutcome::Named(cases) => !cases.is_empty() && cases.iter().all(|case| case.success),
            SuiteOutcome::Pair { primary, .. } => *primary,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            SuiteOutcome::Check(success) => mark(*success).to_string(),
            SuiteOutcome::Dedup(attempts) => {
                let successes = attempts.iter().filter(|success| **success).count();
                format!(
                    "{:.1}% success rate ({successes}/{})",
                    percent(successes, attempts.len()),
                    attempts.len()
                )
            }
            SuiteOutcome::Named(cases) => {
                let successes = cases.iter().filter(|case| case.success).count();
                format!("{successes}/{} passed", cases.len())
            }
            SuiteOutcome::Pair {
                primary,
                comparison,
            } => format!("primary {}, comparison {}", mark(*primary), mark(*comparison)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub title: String,
    pub checks: Vec<(String, SuiteOutcome)>,
}

impl SuiteReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: SuiteOutcome) {
        self.checks.push((name.into(), outcome));
    }

    pub fn passed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|(_, outcome)| outcome.passed())
            .count()
    }

    pub fn passed(&self) -> bool {
        self.passed_count() == self.checks.len()
    }

    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "{} summary", self.title)?;
        writeln!(out, "{RULE}")?;
        for (name, outcome) in &self.checks {
            writeln!(out, "  {name}: {}", outcome.summary())?;
        }
        writeln!(
            out,
            "\noverall: {}/{} checks passed ({:.1}%)",
            self.passed_count(),
            self.checks.len(),
            percent(self.passed_count(), self.checks.len())
        )
    }
}

pub fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "==================== {title} ====================")
}
