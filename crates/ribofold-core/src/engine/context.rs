use super::config::FoldConfig;
use super::grammar::Grammar;
use super::progress::ProgressReporter;

/// Read-only inputs shared by the tasks of one fold.
#[derive(Clone, Copy)]
pub struct FoldContext<'a> {
    pub grammar: Grammar<'a>,
    pub config: &'a FoldConfig,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> FoldContext<'a> {
    pub fn new(grammar: Grammar<'a>, config: &'a FoldConfig, reporter: &'a ProgressReporter<'a>) -> Self {
        Self {
            grammar,
            config,
            reporter,
        }
    }

    /// Number of diagonals filled by the interval passes.
    pub fn diagonals(&self) -> u64 {
        self.grammar.span().saturating_sub(crate::core::energy::TURN) as u64
    }
}
