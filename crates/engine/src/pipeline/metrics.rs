use std::time::Instant;

use spikesort_core::SortMetrics;

/// Incremental builder for [`SortMetrics`], updated by each stage as the
/// pipeline runs and consumed into the final result.
#[derive(Debug)]
pub struct MetricsRecorder {
    metrics: SortMetrics,
}

impl MetricsRecorder {
    pub fn new(total_events: usize) -> Self {
        let mut metrics = SortMetrics::default();
        metrics.total_events = total_events;
        metrics.converged = true;
        Self { metrics }
    }

    /// Record a completed stage's wall time.
    pub fn record_stage(&mut self, stage: &str, started: Instant) {
        self.metrics
            .stage_ms
            .push((stage.to_owned(), started.elapsed().as_secs_f64() * 1000.0));
    }

    pub fn set_segment_count(&mut self, count: usize) {
        self.metrics.segment_count = count;
    }

    pub fn set_provisional_units(&mut self, count: usize) {
        self.metrics.provisional_units = count;
    }

    pub fn set_final_units(&mut self, count: usize) {
        self.metrics.final_units = count;
    }

    /// Record the refinement outcome: pass count and whether a fixed
    /// point was reached before the pass cap.
    pub fn set_refinement(&mut self, passes: usize, converged: bool) {
        self.metrics.refine_passes = passes;
        self.metrics.converged = converged;
    }

    pub fn finish(self) -> SortMetrics {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_recorded_in_order() {
        let mut rec = MetricsRecorder::new(10);
        rec.record_stage("features", Instant::now());
        rec.record_stage("segments", Instant::now());
        let m = rec.finish();
        assert_eq!(m.total_events, 10);
        assert_eq!(m.stage_ms.len(), 2);
        assert_eq!(m.stage_ms[0].0, "features");
        assert_eq!(m.stage_ms[1].0, "segments");
        assert!(m.converged);
    }

    #[test]
    fn refinement_outcome_carried_through() {
        let mut rec = MetricsRecorder::new(0);
        rec.set_refinement(32, false);
        let m = rec.finish();
        assert_eq!(m.refine_passes, 32);
        assert!(!m.converged);
    }
}
