use thiserror::Error;

#[derive(Error, Debug)]
pub enum SortError {
    #[error("misaligned input: {times} timestamps but {waveforms} waveforms")]
    MisalignedInput { times: usize, waveforms: usize },

    #[error(
        "malformed waveform at event {index}: expected {expected_channels}x{expected_samples}, \
         got {got_channels}x{got_samples}"
    )]
    MalformedWaveform {
        index: usize,
        expected_channels: usize,
        expected_samples: usize,
        got_channels: usize,
        got_samples: usize,
    },

    #[error("invalid config option `{option}`: {reason}")]
    InvalidConfig {
        option: &'static str,
        reason: String,
    },
}
