pub mod algorithms;
pub mod pipeline;

pub use pipeline::SpikeSorter;
pub use spikesort_core::{
    Dataset, SortConfig, SortError, SortMetrics, SortResult, UnitLabel, UnitSummary, Waveform,
    NOISE_LABEL,
};
