use std::time::Instant;

use tracing::{debug, info, warn};

use spikesort_core::{Dataset, SortConfig, SortError, SortResult, NOISE_LABEL};

pub mod assemble;
pub mod features;
pub mod link;
pub mod local;
pub mod metrics;
pub mod refine;
pub mod segments;

use metrics::MetricsRecorder;

/// The batch spike sorter: one configuration, reusable across datasets.
///
/// `sort` runs the full pipeline — feature extraction, temporal
/// segmentation, per-segment density clustering, cross-segment linking,
/// merge/split refinement, assembly — and is deterministic for a given
/// dataset and configuration.
#[derive(Debug, Clone)]
pub struct SpikeSorter {
    config: SortConfig,
}

impl Default for SpikeSorter {
    fn default() -> Self {
        Self::new(SortConfig::default())
    }
}

impl SpikeSorter {
    pub fn new(config: SortConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Sort one recording. Fails only on an invalid configuration or a
    /// malformed dataset; degenerate data (empty, single event, zero
    /// span) produces a minimal valid result.
    pub fn sort(&self, dataset: &Dataset) -> Result<SortResult, SortError> {
        self.config.validate()?;
        dataset.validate()?;

        if dataset.is_empty() {
            info!("empty dataset, returning empty result");
            return Ok(SortResult::empty());
        }

        info!(events = dataset.len(), "sorting started");
        let mut recorder = MetricsRecorder::new(dataset.len());

        let started = Instant::now();
        let features = features::extract(dataset, &self.config);
        recorder.record_stage("features", started);
        debug!(
            dim = features.first().map(Vec::len).unwrap_or(0),
            "features extracted"
        );

        let started = Instant::now();
        let segments = segments::build_segments(
            &dataset.times,
            self.config.segment_width,
            self.config.segment_overlap,
        );
        recorder.record_stage("segments", started);
        recorder.set_segment_count(segments.len());
        info!(segments = segments.len(), "recording segmented");

        let started = Instant::now();
        let candidates = local::assign_all(&segments, &features, &self.config);
        recorder.record_stage("local_clusters", started);
        debug!(
            candidates = candidates.iter().map(Vec::len).sum::<usize>(),
            "local clusters assigned"
        );

        let started = Instant::now();
        let provisional = link::link(&candidates, &segments, &dataset.times, &self.config);
        recorder.record_stage("link", started);
        recorder.set_provisional_units(provisional.len());
        info!(provisional_units = provisional.len(), "segments linked");

        let started = Instant::now();
        let refinement = refine::refine(provisional, &features, &self.config);
        recorder.record_stage("refine", started);
        recorder.set_refinement(refinement.passes, refinement.converged);
        if refinement.converged {
            info!(passes = refinement.passes, "refinement converged");
        } else {
            warn!(
                passes = refinement.passes,
                "refinement hit the pass cap, returning best state reached"
            );
        }

        let started = Instant::now();
        let (labels, units) = assemble::assemble(refinement.units, dataset, &features);
        recorder.record_stage("assemble", started);

        let final_units = units.iter().filter(|u| u.label != NOISE_LABEL).count();
        recorder.set_final_units(final_units);
        info!(units = final_units, "sorting finished");

        Ok(SortResult {
            labels,
            units,
            metrics: recorder.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikesort_core::Waveform;

    /// Deterministic uniform noise in [-1, 1).
    fn noise(seed: &mut u64) -> f64 {
        *seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((*seed >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }

    const TEMPLATE_A: [f64; 12] = [
        0.0, 0.5, 2.0, 8.0, 3.0, 1.0, 0.3, -0.5, -1.5, -0.8, -0.2, 0.0,
    ];
    const TEMPLATE_B: [f64; 12] = [
        0.0, -0.2, -0.8, -1.5, -0.5, 0.3, 1.0, 3.0, 8.0, 2.0, 0.5, 0.0,
    ];

    fn spike(template: &[f64], amplitude: f64, sigma: f64, seed: &mut u64) -> Waveform {
        let samples = template
            .iter()
            .map(|&s| amplitude * (s + sigma * noise(seed)))
            .collect();
        Waveform::single_channel(samples)
    }

    /// Two interleaved spike trains from distinct templates, fitting in
    /// one segment.
    fn two_unit_dataset(n: usize, sigma: f64) -> Dataset {
        let mut seed = 7;
        let mut times = Vec::with_capacity(n);
        let mut waveforms = Vec::with_capacity(n);
        for i in 0..n {
            times.push(i as f64 * 0.1);
            let template = if i % 2 == 0 { &TEMPLATE_A } else { &TEMPLATE_B };
            waveforms.push(spike(template, 1.0, sigma, &mut seed));
        }
        Dataset { times, waveforms }
    }

    #[test]
    fn empty_dataset_sorts_to_empty_result() {
        let result = SpikeSorter::default().sort(&Dataset::default()).unwrap();
        assert!(result.labels.is_empty());
        assert!(result.units.is_empty());
        assert!(result.metrics.converged);
    }

    #[test]
    fn single_event_is_noise_not_error() {
        let ds = Dataset {
            times: vec![1.0],
            waveforms: vec![spike(&TEMPLATE_A, 1.0, 0.0, &mut 1)],
        };
        let result = SpikeSorter::default().sort(&ds).unwrap();
        assert_eq!(result.labels, vec![NOISE_LABEL]);
        assert_eq!(result.unit_labels().count(), 0);
    }

    #[test]
    fn invalid_config_rejected_before_running() {
        let sorter = SpikeSorter::new(SortConfig {
            feature_dim: 0,
            ..SortConfig::default()
        });
        let err = sorter.sort(&two_unit_dataset(20, 0.005)).unwrap_err();
        assert!(matches!(err, SortError::InvalidConfig { option: "feature_dim", .. }));
    }

    #[test]
    fn misaligned_dataset_rejected() {
        let mut ds = two_unit_dataset(10, 0.005);
        ds.times.pop();
        let err = SpikeSorter::default().sort(&ds).unwrap_err();
        assert!(matches!(err, SortError::MisalignedInput { .. }));
    }

    #[test]
    fn every_event_receives_a_label() {
        let ds = two_unit_dataset(60, 0.01);
        let result = SpikeSorter::default().sort(&ds).unwrap();
        assert_eq!(result.labels.len(), ds.len());

        let summarized: usize = result.units.iter().map(|u| u.event_count).sum();
        assert_eq!(summarized, ds.len(), "summaries must partition the events");
    }

    #[test]
    fn sorting_is_deterministic() {
        let ds = two_unit_dataset(80, 0.01);
        let sorter = SpikeSorter::default();
        let a = sorter.sort(&ds).unwrap();
        let b = sorter.sort(&ds).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.metrics.segment_count, b.metrics.segment_count);
    }

    #[test]
    fn two_distinct_templates_separate_cleanly() {
        let n = 120;
        let ds = two_unit_dataset(n, 0.005);
        let sorter = SpikeSorter::new(SortConfig {
            cluster_similarity_threshold: 1.5,
            ..SortConfig::default()
        });
        let result = sorter.sort(&ds).unwrap();

        assert_eq!(result.unit_labels().count(), 2);

        // Agreement with the generating classes, modulo label naming:
        // every even event shares one label, every odd event the other,
        // allowing at most 1% strays.
        let even_label = result.labels[0];
        let odd_label = result.labels[1];
        assert_ne!(even_label, odd_label);
        assert_ne!(even_label, NOISE_LABEL);
        assert_ne!(odd_label, NOISE_LABEL);

        let agree = result
            .labels
            .iter()
            .enumerate()
            .filter(|(i, &l)| l == if i % 2 == 0 { even_label } else { odd_label })
            .count();
        assert!(
            agree * 100 >= n * 99,
            "only {agree}/{n} events agree with the generating classes"
        );
    }

    #[test]
    fn gradual_amplitude_drift_stays_one_unit() {
        // One template over 300 seconds, amplitude ramping linearly by
        // 20%; the span covers several overlapping segments.
        let n = 300;
        let mut seed = 11;
        let mut times = Vec::with_capacity(n);
        let mut waveforms = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64;
            times.push(t);
            let amplitude = 1.0 + 0.2 * t / n as f64;
            waveforms.push(spike(&TEMPLATE_A, amplitude, 0.005, &mut seed));
        }
        let ds = Dataset { times, waveforms };

        let result = SpikeSorter::default().sort(&ds).unwrap();

        assert!(result.metrics.segment_count > 1, "drift must cross segments");
        assert_eq!(
            result.unit_labels().count(),
            1,
            "drift split the unit: {:?}",
            result
                .units
                .iter()
                .map(|u| (u.label, u.event_count))
                .collect::<Vec<_>>()
        );
        let unit = result.units.iter().find(|u| u.label != NOISE_LABEL).unwrap();
        assert!(unit.event_count * 100 >= n * 99);
    }

    #[test]
    fn structureless_noise_produces_no_dominant_unit() {
        let n = 80;
        let mut seed = 23;
        let mut times = Vec::with_capacity(n);
        let mut waveforms = Vec::with_capacity(n);
        for i in 0..n {
            times.push(i as f64 * 0.1);
            let samples = (0..12).map(|_| noise(&mut seed)).collect();
            waveforms.push(Waveform::single_channel(samples));
        }
        let ds = Dataset { times, waveforms };

        let sorter = SpikeSorter::new(SortConfig {
            cluster_similarity_threshold: 0.5,
            ..SortConfig::default()
        });
        let result = sorter.sort(&ds).unwrap();

        for unit in &result.units {
            if unit.label != NOISE_LABEL {
                assert!(
                    unit.event_count < n / 2,
                    "unit {} captured {} of {} structureless events",
                    unit.label,
                    unit.event_count,
                    n
                );
            }
        }
    }

    #[test]
    fn metrics_cover_every_stage() {
        let ds = two_unit_dataset(40, 0.01);
        let result = SpikeSorter::default().sort(&ds).unwrap();

        let stages: Vec<&str> = result
            .metrics
            .stage_ms
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(
            stages,
            vec!["features", "segments", "local_clusters", "link", "refine", "assemble"]
        );
        assert_eq!(result.metrics.total_events, 40);
        assert!(result.metrics.converged);
    }
}
