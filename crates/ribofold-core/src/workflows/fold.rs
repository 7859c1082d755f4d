use crate::core::energy::EnergyModel;
use crate::core::structure::{BasePair, SecondaryStructure};
use crate::engine::compound::FoldCompound;
use crate::engine::config::FoldConfig;
use crate::engine::error::FoldError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{MfeResult, PartitionResult};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct FoldReport {
    pub sequence: String,
    pub mfe: MfeResult,
    pub ensemble: PartitionResult,
    /// Pairs with probability at least the configured cutoff.
    pub pairs: Vec<(BasePair, f64)>,
    pub centroid: SecondaryStructure,
}

/// Folds one sequence: optimum, ensemble and pair probabilities, under an
/// optional constraint string in pseudo dot-bracket notation.
#[instrument(skip_all, name = "fold_workflow")]
pub fn run(
    sequence: &str,
    model: Arc<EnergyModel>,
    config: &FoldConfig,
    constraint: Option<&str>,
    reporter: &ProgressReporter,
) -> Result<FoldReport, FoldError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart { name: "Preparation" });
    let mut compound = FoldCompound::new(sequence, model, config.clone())?;
    if let Some(text) = constraint {
        compound.apply_structure_constraint(text)?;
    }
    let sequence = compound
        .sequence()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default();
    info!(length = compound.len(), constrained = constraint.is_some(), "Fold prepared.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Minimum free energy ===
    let mfe = compound.mfe_with_progress(reporter)?;
    info!(
        structure = %mfe.structure,
        energy = mfe.energy,
        "Minimum free energy structure found."
    );

    // === Phase 2: Ensemble ===
    let ensemble = compound.partition_function_with_progress(reporter)?;
    let probabilities = compound.base_pair_probabilities_with_progress(reporter)?;
    let pairs = probabilities.pairs_above(config.probability_cutoff);
    let centroid = probabilities.centroid()?;
    info!(
        ensemble_energy = ensemble.ensemble_energy,
        reported_pairs = pairs.len(),
        "Ensemble computed."
    );

    Ok(FoldReport {
        sequence,
        mfe,
        ensemble,
        pairs,
        centroid,
    })
}
