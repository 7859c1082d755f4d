//! # Energy Model
//!
//! Nearest-neighbour free energy parameters and the temperature-scaled
//! [`EnergyModel`] built from them.
//!
//! - [`params`] holds the raw 37 °C tables ([`EnergyParams`]) together with
//!   optional enthalpies, TOML loading and completeness validation.
//! - [`defaults`] provides the built-in parameter set and the special
//!   hairpin loop tables.
//! - [`model`] rescales every table to the requested temperature and exposes
//!   the loop energy functions (hairpin, interior, multiloop and exterior
//!   stems) shared by every folding engine.
//!
//! Energies are integers in dcal/mol throughout; Boltzmann factors are
//! derived from those same integers so that MFE and partition-function
//! results stay consistent.

pub mod defaults;
pub mod model;
pub mod params;

pub use model::{DangleModel, EnergyModel, ModelOptions, boltzmann};
pub use params::{Energy, EnergyParams, IncompleteModel, ParamLoadError};

/// Sentinel for forbidden configurations, in dcal/mol.
pub const INF: i32 = 10_000_000;

/// Minimum number of unpaired bases enclosed by a hairpin.
pub const TURN: usize = 3;

/// Largest loop size with tabulated initiation energies; also the maximum
/// total size of interior loops considered by the engines.
pub const MAXLOOP: usize = 30;
