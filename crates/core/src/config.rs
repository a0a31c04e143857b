use serde::{Deserialize, Serialize};

use crate::error::SortError;

/// Engine configuration. Every option has a default so the sorter is
/// runnable with no configuration supplied, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    /// Number of principal shape components retained per waveform.
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    /// Temporal segment width in the timestamp unit (usually seconds).
    #[serde(default = "default_segment_width")]
    pub segment_width: f64,
    /// Fraction of each segment shared with its successor, in [0, 1).
    #[serde(default = "default_segment_overlap")]
    pub segment_overlap: f64,
    /// Dimensionless similarity threshold used for both local density
    /// grouping and cross-segment linking. Larger = more permissive.
    #[serde(default = "default_cluster_similarity_threshold")]
    pub cluster_similarity_threshold: f64,
    /// Two units merge when their axis-projected mean separation falls
    /// below this value. Halves of one Gaussian cloud score ~2.7, so
    /// values below that treat such pairs as distinct.
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance: f64,
    /// A unit splits when its 2-means bisection silhouette exceeds this
    /// value, in (0, 1). Any bisection of a single spread-out cloud
    /// (including a drift smear) stays near 0.35; real multimodality
    /// scores 0.7 and up.
    #[serde(default = "default_split_tolerance")]
    pub split_tolerance: f64,
    /// Minimum member count for a unit to exist (and for either half of
    /// a split to survive).
    #[serde(default = "default_min_unit_size")]
    pub min_unit_size: usize,
    /// Upper bound on merge/split refinement passes.
    #[serde(default = "default_max_refine_passes")]
    pub max_refine_passes: usize,
    /// Normalize each waveform to unit peak amplitude before projection,
    /// retaining the original amplitude as one extra feature.
    #[serde(default = "default_normalize_amplitude")]
    pub normalize_amplitude: bool,
}

fn default_feature_dim() -> usize { 3 }
fn default_segment_width() -> f64 { 60.0 }
fn default_segment_overlap() -> f64 { 0.25 }
fn default_cluster_similarity_threshold() -> f64 { 1.0 }
fn default_merge_tolerance() -> f64 { 2.0 }
fn default_split_tolerance() -> f64 { 0.6 }
fn default_min_unit_size() -> usize { 8 }
fn default_max_refine_passes() -> usize { 32 }
fn default_normalize_amplitude() -> bool { true }

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            feature_dim: default_feature_dim(),
            segment_width: default_segment_width(),
            segment_overlap: default_segment_overlap(),
            cluster_similarity_threshold: default_cluster_similarity_threshold(),
            merge_tolerance: default_merge_tolerance(),
            split_tolerance: default_split_tolerance(),
            min_unit_size: default_min_unit_size(),
            max_refine_passes: default_max_refine_passes(),
            normalize_amplitude: default_normalize_amplitude(),
        }
    }
}

impl SortConfig {
    /// Check option ranges before any stage runs. Returns the offending
    /// option by name so the caller can report it.
    pub fn validate(&self) -> Result<(), SortError> {
        if self.feature_dim == 0 {
            return Err(SortError::InvalidConfig {
                option: "feature_dim",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.segment_width > 0.0) {
            return Err(SortError::InvalidConfig {
                option: "segment_width",
                reason: format!("must be positive, got {}", self.segment_width),
            });
        }
        if !(0.0..1.0).contains(&self.segment_overlap) {
            return Err(SortError::InvalidConfig {
                option: "segment_overlap",
                reason: format!("must be in [0, 1), got {}", self.segment_overlap),
            });
        }
        if !(self.cluster_similarity_threshold > 0.0) {
            return Err(SortError::InvalidConfig {
                option: "cluster_similarity_threshold",
                reason: format!("must be positive, got {}", self.cluster_similarity_threshold),
            });
        }
        if !(self.merge_tolerance >= 0.0) {
            return Err(SortError::InvalidConfig {
                option: "merge_tolerance",
                reason: format!("must be non-negative, got {}", self.merge_tolerance),
            });
        }
        if !(self.split_tolerance > 0.0 && self.split_tolerance < 1.0) {
            return Err(SortError::InvalidConfig {
                option: "split_tolerance",
                reason: format!("must be in (0, 1), got {}", self.split_tolerance),
            });
        }
        if self.min_unit_size == 0 {
            return Err(SortError::InvalidConfig {
                option: "min_unit_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_refine_passes == 0 {
            return Err(SortError::InvalidConfig {
                option: "max_refine_passes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
