pub use crate::core::energy::{DangleModel, ModelOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// How two pair types seen in the same column pair are compared.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum PairScoring {
    /// Number of differing nucleotides between the two pairs.
    #[default]
    Hamming,
    /// Symmetric substitution scores over the pair types CG GC GU UG AU UA,
    /// e.g. a RIBOSUM table. Entries take the place of the Hamming
    /// distances, diagonal included.
    Matrix { scores: [[f64; 6]; 6] },
}

/// Weights of the covariation score used in consensus folding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CovarianceOptions {
    /// Weight of compensatory mutations.
    pub cv_fact: f64,
    /// Weight of non-compatible sequences.
    pub nc_fact: f64,
    pub scoring: PairScoring,
}

impl Default for CovarianceOptions {
    fn default() -> Self {
        Self {
            cv_fact: 1.0,
            nc_fact: 1.0,
            scoring: PairScoring::Hamming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldConfig {
    pub model: ModelOptions,
    /// Largest `j - i` of any pair; `None` folds globally.
    pub max_bp_span: Option<usize>,
    /// Sequences (or alignments) longer than this are rejected up front.
    pub max_length: usize,
    /// Multiplier on the MFE-based estimate of the per-nucleotide scale.
    pub pf_scale_factor: f64,
    /// Pair probabilities below this value are not reported.
    pub probability_cutoff: f64,
    pub covariance: CovarianceOptions,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            model: ModelOptions::default(),
            max_bp_span: None,
            max_length: 10_000,
            pf_scale_factor: 1.07,
            probability_cutoff: 1e-5,
            covariance: CovarianceOptions::default(),
        }
    }
}

impl FoldConfig {
    pub fn builder() -> FoldConfigBuilder {
        FoldConfigBuilder::new()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &'static str, reason: String| Err(ConfigError::InvalidParameter { name, reason });

        if !self.model.temperature.is_finite() || self.model.temperature <= -273.15 {
            return invalid(
                "temperature",
                format!("{} °C is below absolute zero", self.model.temperature),
            );
        }
        if self.max_length == 0 {
            return invalid("max_length", "must be at least 1".to_string());
        }
        if let Some(span) = self.max_bp_span {
            if span < 4 {
                return invalid("max_bp_span", format!("{span} cannot enclose a hairpin"));
            }
        }
        if !(self.pf_scale_factor.is_finite() && self.pf_scale_factor > 0.0) {
            return invalid("pf_scale_factor", format!("{} must be positive", self.pf_scale_factor));
        }
        if !(0.0..=1.0).contains(&self.probability_cutoff) {
            return invalid(
                "probability_cutoff",
                format!("{} is not a probability", self.probability_cutoff),
            );
        }
        if !(self.covariance.cv_fact.is_finite() && self.covariance.nc_fact.is_finite()) {
            return invalid("covariance", "weights must be finite".to_string());
        }
        if let PairScoring::Matrix { scores } = &self.covariance.scoring {
            for k in 0..6 {
                for l in 0..6 {
                    if !scores[k][l].is_finite() {
                        return invalid("covariance.scoring", format!("entry ({k}, {l}) is not finite"));
                    }
                    if (scores[k][l] - scores[l][k]).abs() > 1e-9 {
                        return invalid("covariance.scoring", format!("entries ({k}, {l}) and ({l}, {k}) differ"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FoldConfigBuilder {
    model: Option<ModelOptions>,
    temperature: Option<f64>,
    dangles: Option<DangleModel>,
    no_lonely_pairs: Option<bool>,
    max_bp_span: Option<usize>,
    max_length: Option<usize>,
    pf_scale_factor: Option<f64>,
    probability_cutoff: Option<f64>,
    covariance: Option<CovarianceOptions>,
    pair_scoring: Option<PairScoring>,
}

impl FoldConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, options: ModelOptions) -> Self {
        self.model = Some(options);
        self
    }
    pub fn temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }
    pub fn dangles(mut self, dangles: DangleModel) -> Self {
        self.dangles = Some(dangles);
        self
    }
    pub fn no_lonely_pairs(mut self, enabled: bool) -> Self {
        self.no_lonely_pairs = Some(enabled);
        self
    }
    pub fn max_bp_span(mut self, span: usize) -> Self {
        self.max_bp_span = Some(span);
        self
    }
    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }
    pub fn pf_scale_factor(mut self, factor: f64) -> Self {
        self.pf_scale_factor = Some(factor);
        self
    }
    pub fn probability_cutoff(mut self, cutoff: f64) -> Self {
        self.probability_cutoff = Some(cutoff);
        self
    }
    pub fn covariance(mut self, cv_fact: f64, nc_fact: f64) -> Self {
        self.covariance = Some(CovarianceOptions {
            cv_fact,
            nc_fact,
            ..CovarianceOptions::default()
        });
        self
    }
    pub fn pair_scoring(mut self, scoring: PairScoring) -> Self {
        self.pair_scoring = Some(scoring);
        self
    }

    pub fn build(self) -> Result<FoldConfig, ConfigError> {
        let defaults = FoldConfig::default();
        let mut model = self.model.unwrap_or(defaults.model);
        if let Some(t) = self.temperature {
            model.temperature = t;
        }
        if let Some(d) = self.dangles {
            model.dangles = d;
        }
        if let Some(flag) = self.no_lonely_pairs {
            model.no_lonely_pairs = flag;
        }

        let mut covariance = self.covariance.unwrap_or(defaults.covariance);
        if let Some(scoring) = self.pair_scoring {
            covariance.scoring = scoring;
        }

        let config = FoldConfig {
            model,
            max_bp_span: self.max_bp_span.or(defaults.max_bp_span),
            max_length: self.max_length.unwrap_or(defaults.max_length),
            pf_scale_factor: self.pf_scale_factor.unwrap_or(defaults.pf_scale_factor),
            probability_cutoff: self.probability_cutoff.unwrap_or(defaults.probability_cutoff),
            covariance,
        };
        config.validate()?;
        Ok(config)
    }
}
