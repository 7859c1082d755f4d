use crate::core::energy::EnergyModel;
use crate::core::sequence::Alignment;
use crate::engine::compound::FoldCompound;
use crate::engine::config::FoldConfig;
use crate::engine::error::FoldError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{ConsensusResult, PartitionResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct ConsensusReport {
    pub sequences: usize,
    pub columns: usize,
    /// Mean pairwise sequence identity of the rows, in percent.
    pub identity: f64,
    pub consensus: ConsensusResult,
    pub ensemble: PartitionResult,
}

/// Folds the rows of an alignment into one consensus structure scored by
/// the averaged loop energies plus covariation.
#[instrument(skip_all, name = "alifold_workflow", fields(sequences = rows.len()))]
pub fn run<S: AsRef<str>>(
    rows: &[S],
    model: Arc<EnergyModel>,
    config: &FoldConfig,
    reporter: &ProgressReporter,
) -> Result<ConsensusReport, FoldError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart { name: "Preparation" });
    let mut compound = FoldCompound::from_alignment(rows, model, config.clone())?;
    let (sequences, columns) = (compound.n_seq(), compound.len());
    let identity = compound
        .alignment()
        .map_or(100.0, Alignment::mean_pairwise_identity);
    debug!(identity, "Measured mean pairwise identity.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Consensus structure and pair support ===
    let consensus = compound.consensus_with_progress(reporter)?;
    let ensemble = compound.partition_function_with_progress(reporter)?;
    info!(
        structure = %consensus.structure,
        energy = consensus.energy,
        covariance = consensus.covariance,
        "Consensus structure found."
    );

    Ok(ConsensusReport {
        sequences,
        columns,
        identity,
        consensus,
        ensemble,
    })
}
