use super::config::{ConfigError, FoldConfig};
use super::context::FoldContext;
use super::error::FoldError;
use super::grammar::Grammar;
use super::matrices::{MfeMatrices, PfMatrices, ProbabilityMatrix};
use super::progress::ProgressReporter;
use super::scorer::{AlignmentScorer, LoopScorer, Scorer, SequenceScorer};
use super::state::{
    ConsensusPair, ConsensusResult, Evaluation, MfeResult, PartitionResult, Sample, SuboptStructure,
    kcal_per_sequence,
};
use super::tasks::{backtrack, eval, mfe, partition, probabilities, stochastic, subopt};
use crate::core::constraints::{
    Command, ConstraintError, HardConstraint, HardConstraints, LoopContext, MAX_PSEUDO_ENERGY,
    PseudoEnergies, SoftConstraint, SoftLayer, parse_command_file, parse_structure_constraint,
};
use crate::core::energy::EnergyModel;
use crate::core::sequence::{Alignment, Sequence};
use crate::core::structure::SecondaryStructure;
use itertools::Itertools;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One folding session: a sequence or alignment bound to an energy model,
/// a constraint set and the matrices computed so far.
///
/// Matrices are filled lazily by the fold operations and reused until a
/// constraint update invalidates them.
pub struct FoldCompound {
    scorer: Scorer,
    config: FoldConfig,
    hard: HardConstraints,
    pseudo: PseudoEnergies,
    user_soft: Option<Arc<dyn SoftConstraint>>,
    soft: SoftLayer,
    mfe: Option<MfeMatrices>,
    pf: Option<PfMatrices>,
    probabilities: Option<ProbabilityMatrix>,
}

impl FoldCompound {
    pub fn new(sequence: &str, model: Arc<EnergyModel>, config: FoldConfig) -> Result<Self, FoldError> {
        config.validate()?;
        let length = sequence.chars().filter(|c| !c.is_whitespace()).count();
        check_length(length, &config)?;
        let sequence = Sequence::parse(sequence)?;
        check_model_options(&model, &config);

        let scorer = Scorer::Sequence(SequenceScorer::new(sequence, model));
        info!(length, "Created fold compound.");
        Ok(Self::with_scorer(scorer, config))
    }

    /// Compound folding the rows of an alignment into one consensus
    /// structure over alignment columns.
    pub fn from_alignment<S: AsRef<str>>(
        rows: &[S],
        model: Arc<EnergyModel>,
        config: FoldConfig,
    ) -> Result<Self, FoldError> {
        config.validate()?;
        let length = rows
            .iter()
            .map(|row| row.as_ref().chars().filter(|c| !c.is_whitespace()).count())
            .max()
            .unwrap_or(0);
        check_length(length, &config)?;
        let alignment = Alignment::new(rows)?;
        check_model_options(&model, &config);

        let sequences = alignment.n_seq();
        let scorer = Scorer::Alignment(AlignmentScorer::new(
            alignment,
            model,
            &config.covariance,
            config.max_bp_span,
        ));
        info!(columns = length, sequences, "Created consensus fold compound.");
        Ok(Self::with_scorer(scorer, config))
    }

    fn with_scorer(scorer: Scorer, config: FoldConfig) -> Self {
        let n = scorer.len();
        let hard = default_constraints(&scorer, &config);
        Self {
            soft: SoftLayer::empty(n),
            scorer,
            config,
            hard,
            pseudo: PseudoEnergies::new(),
            user_soft: None,
            mfe: None,
            pf: None,
            probabilities: None,
        }
    }

    pub fn len(&self) -> usize {
        self.scorer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorer.is_empty()
    }

    pub fn n_seq(&self) -> usize {
        self.scorer.n_seq()
    }

    pub fn config(&self) -> &FoldConfig {
        &self.config
    }

    pub fn model(&self) -> &EnergyModel {
        self.scorer.model()
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match &self.scorer {
            Scorer::Sequence(s) => Some(s.sequence()),
            Scorer::Alignment(_) => None,
        }
    }

    pub fn alignment(&self) -> Option<&Alignment> {
        match &self.scorer {
            Scorer::Sequence(_) => None,
            Scorer::Alignment(a) => Some(a.alignment()),
        }
    }

    pub fn hard_constraints(&self) -> &HardConstraints {
        &self.hard
    }

    fn no_lp(&self) -> bool {
        self.scorer.model().options().no_lonely_pairs
    }

    fn grammar(&self) -> Grammar<'_> {
        Grammar::new(&self.scorer, &self.hard, &self.soft, self.no_lp())
    }

    fn invalidate(&mut self) {
        if self.mfe.is_some() || self.pf.is_some() {
            debug!("Constraints changed, discarding computed matrices.");
        }
        self.mfe = None;
        self.pf = None;
        self.probabilities = None;
        self.soft = SoftLayer::new(
            self.len(),
            &self.pseudo,
            self.user_soft.clone(),
            self.n_seq() as i32,
        );
    }

    /// Applies a constraint string in pseudo dot-bracket notation.
    pub fn apply_structure_constraint(&mut self, text: &str) -> Result<(), FoldError> {
        let commands = parse_structure_constraint(text, self.len())?;
        self.apply_commands(&commands)
    }

    /// Applies the commands of a constraint file's contents.
    pub fn apply_command_file(&mut self, text: &str) -> Result<(), FoldError> {
        let commands = parse_command_file(text, self.len())?;
        self.apply_commands(&commands)
    }

    pub fn load_command_file(&mut self, path: &Path) -> Result<(), FoldError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FoldError::InvalidConstraint(ConstraintError::Command {
                line: 0,
                message: format!("cannot read {}: {e}", path.display()),
            })
        })?;
        self.apply_command_file(&text)
    }

    /// Applies `commands` as one batch; on error the constraints are left
    /// as they were.
    #[instrument(skip_all, name = "apply_constraints", fields(commands = commands.len()))]
    pub fn apply_commands(&mut self, commands: &[Command]) -> Result<(), FoldError> {
        let mut hard = self.hard.clone();
        let mut pseudo = self.pseudo.clone();
        for command in commands {
            match *command {
                Command::PairBonus { i, j, energy } => {
                    self.check_pair(i, j)?;
                    check_pseudo_energy(energy)?;
                    pseudo.add_pair(i, j, energy);
                }
                Command::UnpairedBonus { i, energy } => {
                    self.check_position(i)?;
                    check_pseudo_energy(energy)?;
                    pseudo.add_unpaired(i, energy);
                }
                _ => hard.apply(command)?,
            }
        }
        hard.validate()?;

        self.hard = hard;
        self.pseudo = pseudo;
        self.invalidate();
        Ok(())
    }

    pub fn force_pair(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        self.apply_commands(&[Command::ForcePair {
            i: i.min(j),
            j: i.max(j),
            context: LoopContext::ALL,
        }])
    }

    pub fn force_unpaired(&mut self, i: usize) -> Result<(), FoldError> {
        self.apply_commands(&[Command::ForceUnpaired {
            i,
            context: LoopContext::NONE,
        }])
    }

    pub fn prohibit_pair(&mut self, i: usize, j: usize) -> Result<(), FoldError> {
        self.apply_commands(&[Command::ProhibitPair {
            i: i.min(j),
            j: i.max(j),
            context: LoopContext::ALL,
        }])
    }

    /// Adds a pseudo-energy in dcal/mol to pair `(i, j)`, or to `i` staying
    /// unpaired when `j` is `None`.
    pub fn add_pseudo_energy(&mut self, i: usize, j: Option<usize>, energy: i32) -> Result<(), FoldError> {
        let command = match j {
            Some(j) => Command::PairBonus {
                i: i.min(j),
                j: i.max(j),
                energy,
            },
            None => Command::UnpairedBonus { i, energy },
        };
        self.apply_commands(&[command])
    }

    pub fn set_soft_constraint(&mut self, constraint: Arc<dyn SoftConstraint>) {
        self.user_soft = Some(constraint);
        self.invalidate();
    }

    /// Narrows the allowed pairs and unpaired bases with `constraint`,
    /// replacing any earlier one. Fails without changes when a forced pair
    /// or unpaired base would be vetoed.
    pub fn set_hard_constraint(&mut self, constraint: Arc<dyn HardConstraint>) -> Result<(), FoldError> {
        let mut hard = self.hard.clone();
        hard.set_filter(Some(constraint.as_ref()));
        hard.validate()?;
        debug!("Installed user hard constraint.");
        self.hard = hard;
        self.invalidate();
        Ok(())
    }

    /// Restores the default hard constraints and drops every soft bias and
    /// user callback.
    pub fn clear_constraints(&mut self) {
        self.hard = default_constraints(&self.scorer, &self.config);
        self.pseudo.clear();
        self.user_soft = None;
        self.invalidate();
    }

    fn check_position(&self, i: usize) -> Result<(), ConstraintError> {
        if i == 0 || i > self.len() {
            return Err(ConstraintError::OutOfRange {
                position: i,
                length: self.len(),
            });
        }
        Ok(())
    }

    fn check_pair(&self, i: usize, j: usize) -> Result<(), ConstraintError> {
        self.check_position(i)?;
        self.check_position(j)?;
        if i >= j {
            return Err(ConstraintError::InvalidPair { i, j });
        }
        Ok(())
    }

    pub fn mfe(&mut self) -> Result<MfeResult, FoldError> {
        self.mfe_with_progress(&ProgressReporter::new())
    }

    pub fn mfe_with_progress(&mut self, reporter: &ProgressReporter) -> Result<MfeResult, FoldError> {
        self.ensure_mfe(reporter)?;
        let matrices = self.mfe_matrices()?;
        let structure = backtrack::run(&self.grammar(), matrices)?;
        let score = matrices.mfe();
        Ok(MfeResult {
            structure,
            energy: kcal_per_sequence(score, self.n_seq()),
            score,
        })
    }

    fn ensure_mfe(&mut self, reporter: &ProgressReporter) -> Result<(), FoldError> {
        if self.mfe.is_some() {
            return Ok(());
        }
        self.hard.validate()?;
        let matrices = {
            let context = FoldContext::new(self.grammar(), &self.config, reporter);
            mfe::run(&context)
        };
        if matrices.mfe() >= crate::core::energy::INF {
            return Err(FoldError::ConstraintConflict(
                "no structure satisfies the hard constraints".to_string(),
            ));
        }
        self.mfe = Some(matrices);
        Ok(())
    }

    fn mfe_matrices(&self) -> Result<&MfeMatrices, FoldError> {
        self.mfe
            .as_ref()
            .ok_or_else(|| FoldError::Internal("MFE matrices requested before the fill".to_string()))
    }

    pub fn partition_function(&mut self) -> Result<PartitionResult, FoldError> {
        self.partition_function_with_progress(&ProgressReporter::new())
    }

    pub fn partition_function_with_progress(
        &mut self,
        reporter: &ProgressReporter,
    ) -> Result<PartitionResult, FoldError> {
        self.ensure_pf(reporter)?;
        let pf = self.pf_matrices()?;
        let ln_z = pf.ln_z();
        let ensemble_energy = -self.scorer.effective_kt() * ln_z / (1000.0 * self.n_seq() as f64);
        Ok(PartitionResult {
            ln_z,
            ensemble_energy,
            pf_scale: pf.pf_scale,
        })
    }

    fn ensure_pf(&mut self, reporter: &ProgressReporter) -> Result<(), FoldError> {
        if self.pf.is_some() {
            return Ok(());
        }
        self.ensure_mfe(reporter)?;
        let mfe = self.mfe_matrices()?.mfe();
        let matrices = {
            let context = FoldContext::new(self.grammar(), &self.config, reporter);
            partition::run(&context, mfe)?
        };
        self.pf = Some(matrices);
        Ok(())
    }

    fn pf_matrices(&self) -> Result<&PfMatrices, FoldError> {
        self.pf.as_ref().ok_or_else(|| {
            FoldError::Internal("partition function requested before the fill".to_string())
        })
    }

    pub fn base_pair_probabilities(&mut self) -> Result<&ProbabilityMatrix, FoldError> {
        self.base_pair_probabilities_with_progress(&ProgressReporter::new())
    }

    pub fn base_pair_probabilities_with_progress(
        &mut self,
        reporter: &ProgressReporter,
    ) -> Result<&ProbabilityMatrix, FoldError> {
        if self.probabilities.is_none() {
            self.ensure_pf(reporter)?;
            let probs = {
                let context = FoldContext::new(self.grammar(), &self.config, reporter);
                probabilities::run(&context, self.pf_matrices()?)?
            };
            self.probabilities = Some(probs);
        }
        self.probabilities
            .as_ref()
            .ok_or_else(|| FoldError::Internal("pair probabilities missing after the outside pass".to_string()))
    }

    /// Every structure within `delta` kcal/mol (per sequence) of the
    /// optimum, optionally capped at `cap` structures plus boundary ties.
    pub fn subopt(&mut self, delta: f64, cap: Option<usize>) -> Result<Vec<SuboptStructure>, FoldError> {
        self.subopt_with_progress(delta, cap, &ProgressReporter::new())
    }

    pub fn subopt_with_progress(
        &mut self,
        delta: f64,
        cap: Option<usize>,
        reporter: &ProgressReporter,
    ) -> Result<Vec<SuboptStructure>, FoldError> {
        if !(delta.is_finite() && delta >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "delta",
                reason: format!("{delta} must be a non-negative energy"),
            }
            .into());
        }
        self.ensure_mfe(reporter)?;
        let n_seq = self.n_seq();
        let window = (delta * 100.0 * n_seq as f64).round() as i32;
        let found = subopt::run(&self.grammar(), self.mfe_matrices()?, window, cap)?;
        Ok(found
            .into_iter()
            .map(|(structure, score)| SuboptStructure {
                structure,
                energy: kcal_per_sequence(score, n_seq),
                score,
            })
            .collect_vec())
    }

    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Sample, FoldError> {
        let mut samples = self.sample_many(1, rng)?;
        samples
            .pop()
            .ok_or_else(|| FoldError::Internal("sampling produced no structure".to_string()))
    }

    pub fn sample_many<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Result<Vec<Sample>, FoldError> {
        self.sample_many_with_progress(count, rng, &ProgressReporter::new())
    }

    pub fn sample_many_with_progress<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        rng: &mut R,
        reporter: &ProgressReporter,
    ) -> Result<Vec<Sample>, FoldError> {
        self.ensure_pf(reporter)?;
        let grammar = self.grammar();
        let pf = self.pf_matrices()?;
        (0..count)
            .map(|_| {
                let structure = stochastic::run(&grammar, pf, &mut *rng)?;
                let split = eval::run(&self.scorer, &structure)?;
                Ok(Sample {
                    energy: kcal_per_sequence(split.total(), self.n_seq()),
                    structure,
                })
            })
            .collect()
    }

    pub fn evaluate(&self, structure: &SecondaryStructure) -> Result<Evaluation, FoldError> {
        let split = eval::run(&self.scorer, structure)?;
        let n_seq = self.n_seq();
        Ok(Evaluation {
            energy: kcal_per_sequence(split.total(), n_seq),
            free_energy: kcal_per_sequence(split.free_energy, n_seq),
            covariance: kcal_per_sequence(split.covariance, n_seq),
        })
    }

    pub fn evaluate_dot_bracket(&self, text: &str) -> Result<Evaluation, FoldError> {
        self.evaluate(&SecondaryStructure::from_dot_bracket(text)?)
    }

    pub fn consensus(&mut self) -> Result<ConsensusResult, FoldError> {
        self.consensus_with_progress(&ProgressReporter::new())
    }

    /// Consensus structure with its energy split into thermodynamic and
    /// covariation parts, and per-pair covariation and probability.
    pub fn consensus_with_progress(&mut self, reporter: &ProgressReporter) -> Result<ConsensusResult, FoldError> {
        let structure = self.mfe_with_progress(reporter)?.structure;
        let evaluation = self.evaluate(&structure)?;
        let n_seq = self.n_seq();
        let covariations = structure
            .pairs()
            .into_iter()
            .map(|pair| (pair, -self.scorer.pair_bonus(pair.i, pair.j)))
            .collect_vec();
        let consensus_sequence = match &self.scorer {
            Scorer::Sequence(s) => s.sequence().as_str().to_string(),
            Scorer::Alignment(a) => a.alignment().consensus_sequence(),
        };

        let probs = self.base_pair_probabilities_with_progress(reporter)?;
        let pairs = covariations
            .into_iter()
            .map(|(pair, pscore)| ConsensusPair {
                pair,
                covariation: kcal_per_sequence(pscore, n_seq),
                probability: probs.get(pair.i, pair.j),
            })
            .collect_vec();

        Ok(ConsensusResult {
            structure,
            consensus_sequence,
            energy: evaluation.energy,
            free_energy: evaluation.free_energy,
            covariance: evaluation.covariance,
            pairs,
        })
    }
}

fn check_length(length: usize, config: &FoldConfig) -> Result<(), FoldError> {
    if length > config.max_length {
        warn!(length, max = config.max_length, "Rejecting input above the length ceiling.");
        return Err(FoldError::SequenceTooLong {
            length,
            max: config.max_length,
        });
    }
    Ok(())
}

fn check_model_options(model: &EnergyModel, config: &FoldConfig) {
    if *model.options() != config.model {
        warn!("Energy model was built with different options than the fold configuration; the model's options apply.");
    }
}

fn check_pseudo_energy(energy: i32) -> Result<(), ConstraintError> {
    if energy.unsigned_abs() > MAX_PSEUDO_ENERGY.unsigned_abs() {
        return Err(ConstraintError::PseudoEnergyOutOfRange {
            energy,
            limit: MAX_PSEUDO_ENERGY,
        });
    }
    Ok(())
}

fn default_constraints(scorer: &Scorer, config: &FoldConfig) -> HardConstraints {
    HardConstraints::new(scorer.len(), config.max_bp_span, |i, j| scorer.can_pair(i, j))
}
