use serde::{Deserialize, Serialize};

use crate::dataset::Waveform;

/// Stable per-unit label. Assigned by first-appearance order at assembly.
pub type UnitLabel = u32;

/// Reserved label for events not confidently attributable to any unit.
pub const NOISE_LABEL: UnitLabel = 0;

/// Summary attributes of one sorted unit, recomputed from final
/// membership by the result assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSummary {
    pub label: UnitLabel,
    /// Number of events assigned to this unit.
    pub event_count: usize,
    /// Representative mean waveform across the unit's members.
    pub template: Waveform,
    /// Nearest-other-unit centroid distance over mean within-unit
    /// distance. Higher = better isolated. Zero for the noise unit.
    pub isolation: f64,
    /// Timestamp of the unit's earliest member event.
    pub first_seen: f64,
}

/// Per-run bookkeeping attached to the result so callers can observe
/// stage costs and refinement convergence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortMetrics {
    pub total_events: usize,
    pub segment_count: usize,
    /// Units after linking, before merge/split refinement.
    pub provisional_units: usize,
    pub final_units: usize,
    pub refine_passes: usize,
    /// False when refinement hit its pass cap before reaching a fixed
    /// point; the best-converged state is still returned.
    pub converged: bool,
    /// (stage name, elapsed milliseconds) in execution order.
    pub stage_ms: Vec<(String, f64)>,
}

/// The final artifact: one label per input event plus the surviving
/// units. Total by construction — every event index has a label, with
/// [`NOISE_LABEL`] marking the unassigned pseudo-unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortResult {
    pub labels: Vec<UnitLabel>,
    pub units: Vec<UnitSummary>,
    pub metrics: SortMetrics,
}

impl SortResult {
    /// An empty, valid result for degenerate zero-event input.
    pub fn empty() -> Self {
        Self {
            labels: Vec::new(),
            units: Vec::new(),
            metrics: SortMetrics {
                converged: true,
                ..SortMetrics::default()
            },
        }
    }

    /// Labels of real (non-noise) units, in label order.
    pub fn unit_labels(&self) -> impl Iterator<Item = UnitLabel> + '_ {
        self.units
            .iter()
            .map(|u| u.label)
            .filter(|&l| l != NOISE_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_is_total_and_converged() {
        let r = SortResult::empty();
        assert!(r.labels.is_empty());
        assert!(r.units.is_empty());
        assert!(r.metrics.converged);
    }

    #[test]
    fn unit_labels_skip_noise() {
        let template = Waveform::single_channel(vec![0.0]);
        let mk = |label| UnitSummary {
            label,
            event_count: 1,
            template: template.clone(),
            isolation: 0.0,
            first_seen: 0.0,
        };
        let r = SortResult {
            labels: vec![0, 1, 2],
            units: vec![mk(NOISE_LABEL), mk(1), mk(2)],
            metrics: SortMetrics::default(),
        };
        let labels: Vec<_> = r.unit_labels().collect();
        assert_eq!(labels, vec![1, 2]);
    }
}
