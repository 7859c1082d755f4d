use super::eval;
use crate::core::constraints::{HardConstraints, LoopContext, PseudoEnergies, SoftLayer};
use crate::core::energy::{EnergyModel, EnergyParams, MAXLOOP, ModelOptions, TURN, boltzmann};
use crate::core::sequence::{Alignment, Sequence};
use crate::core::structure::{BasePair, SecondaryStructure};
use crate::engine::config::{CovarianceOptions, FoldConfig};
use crate::engine::context::FoldContext;
use crate::engine::grammar::Grammar;
use crate::engine::progress::ProgressReporter;
use crate::engine::scorer::{AlignmentScorer, LoopScorer, Scorer, SequenceScorer};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a task needs, owned in one place.
pub(crate) struct Setup {
    pub scorer: Scorer,
    pub hc: HardConstraints,
    pub soft: SoftLayer,
    pub config: FoldConfig,
    pub no_lp: bool,
    reporter: ProgressReporter<'static>,
}

impl Setup {
    pub fn sequence(seq: &str, no_lp: bool) -> Self {
        let model = model(no_lp);
        let scorer = Scorer::Sequence(SequenceScorer::new(Sequence::parse(seq).unwrap(), model));
        Self::from_scorer(scorer, no_lp)
    }

    pub fn alignment(rows: &[&str], no_lp: bool) -> Self {
        let model = model(no_lp);
        let scorer = Scorer::Alignment(AlignmentScorer::new(
            Alignment::new(rows).unwrap(),
            model,
            &CovarianceOptions::default(),
            None,
        ));
        Self::from_scorer(scorer, no_lp)
    }

    fn from_scorer(scorer: Scorer, no_lp: bool) -> Self {
        let hc = HardConstraints::new(scorer.len(), None, |i, j| scorer.can_pair(i, j));
        let soft = SoftLayer::empty(scorer.len());
        let config = FoldConfig::builder().no_lonely_pairs(no_lp).build().unwrap();
        Self {
            scorer,
            hc,
            soft,
            config,
            no_lp,
            reporter: ProgressReporter::new(),
        }
    }

    pub fn set_span(&mut self, span: usize) {
        let scorer = &self.scorer;
        self.hc = HardConstraints::new(scorer.len(), Some(span), |i, j| scorer.can_pair(i, j));
    }

    pub fn set_soft(&mut self, table: &PseudoEnergies) {
        self.soft = SoftLayer::new(self.scorer.len(), table, None, self.scorer.n_seq() as i32);
    }

    pub fn grammar(&self) -> Grammar<'_> {
        Grammar::new(&self.scorer, &self.hc, &self.soft, self.no_lp)
    }

    pub fn context(&self) -> FoldContext<'_> {
        FoldContext::new(self.grammar(), &self.config, &self.reporter)
    }
}

fn model(no_lp: bool) -> Arc<EnergyModel> {
    let options = ModelOptions {
        no_lonely_pairs: no_lp,
        ..ModelOptions::default()
    };
    Arc::new(EnergyModel::new(&EnergyParams::default(), &options).unwrap())
}

/// Every structure the fill is allowed to produce, with its energy in
/// dcal/mol. Soft constraints are ignored.
pub(crate) fn brute_force(setup: &Setup) -> Vec<(SecondaryStructure, i32)> {
    let n = setup.scorer.len();
    let mut pair_lists = Vec::new();
    collect(setup, 1, n, &mut Vec::new(), &mut pair_lists);

    pair_lists
        .into_iter()
        .filter_map(|pairs| {
            let structure = SecondaryStructure::from_pairs(n, pairs).unwrap();
            if setup.no_lp && has_lonely_pair(&structure) {
                return None;
            }
            if has_oversized_interior_loop(&structure) {
                return None;
            }
            let energy = eval::run(&setup.scorer, &structure).unwrap().total();
            Some((structure, energy))
        })
        .collect()
}

/// Natural log of the partition function and the pair probabilities over
/// the structures returned by [`brute_force`].
pub(crate) fn brute_force_ensemble(setup: &Setup) -> (f64, HashMap<BasePair, f64>) {
    let kt = setup.scorer.effective_kt();
    let structures = brute_force(setup);
    let z: f64 = structures.iter().map(|(_, e)| boltzmann(*e, kt)).sum();
    let mut probabilities = HashMap::new();
    for (structure, energy) in &structures {
        let weight = boltzmann(*energy, kt) / z;
        for pair in structure.pairs() {
            *probabilities.entry(pair).or_insert(0.0) += weight;
        }
    }
    (z.ln(), probabilities)
}

/// Appends to `out` every pair list over `i..=j` extending `prefix`.
fn collect(setup: &Setup, i: usize, j: usize, prefix: &mut Vec<BasePair>, out: &mut Vec<Vec<BasePair>>) {
    if i > j {
        out.push(prefix.clone());
        return;
    }
    // `i` unpaired.
    collect(setup, i + 1, j, prefix, out);

    for k in (i + TURN + 1)..=j {
        if !setup.hc.allowed(i, k, LoopContext::ALL) {
            continue;
        }
        let mut inside = Vec::new();
        collect(setup, i + 1, k - 1, &mut Vec::new(), &mut inside);
        for inner in inside {
            let mark = prefix.len();
            prefix.push(BasePair { i, j: k });
            prefix.extend(inner);
            collect(setup, k + 1, j, prefix, out);
            prefix.truncate(mark);
        }
    }
}

fn has_lonely_pair(structure: &SecondaryStructure) -> bool {
    structure.pairs().iter().any(|p| {
        let inner = structure.partner(p.i + 1) == Some(p.j - 1);
        let outer = p.i > 1 && structure.partner(p.i - 1) == Some(p.j + 1);
        !inner && !outer
    })
}

fn has_oversized_interior_loop(structure: &SecondaryStructure) -> bool {
    structure.pairs().iter().any(|&p| match structure.branches(Some(p)).as_slice() {
        [inner] => (inner.i - p.i - 1) + (p.j - inner.j - 1) > MAXLOOP,
        _ => false,
    })
}
