/// One temporal window over the recording, holding the indices of every
/// event whose timestamp falls inside it. Windows overlap so the linker
/// has shared events to establish correspondence across.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    /// Ascending global event indices inside `[start, end)` (the final
    /// window is closed so the last timestamp is covered).
    pub events: Vec<usize>,
}

impl Segment {
    pub fn center(&self) -> f64 {
        (self.start + self.end) * 0.5
    }
}

/// Partition `[min(t), max(t)]` into sliding windows of `width` advanced
/// by `width * (1 - overlap)`.
///
/// `times` must be sorted non-decreasing (input precondition, §6). The
/// final window is clamped to end exactly at the last timestamp so every
/// event lands in at least one window. A degenerate span (zero events,
/// one event, or a span no wider than one window) yields exactly one
/// window holding everything.
pub fn build_segments(times: &[f64], width: f64, overlap: f64) -> Vec<Segment> {
    let Some((&t_min, &t_max)) = times.first().zip(times.last()) else {
        return vec![Segment {
            start: 0.0,
            end: 0.0,
            events: Vec::new(),
        }];
    };

    let span = t_max - t_min;
    if span <= width {
        return vec![Segment {
            start: t_min,
            end: t_max,
            events: (0..times.len()).collect(),
        }];
    }

    let step = width * (1.0 - overlap);
    let mut segments = Vec::new();

    let mut start = t_min;
    while start + width < t_max {
        segments.push(Segment {
            start,
            end: start + width,
            events: events_in(times, start, start + width, false),
        });
        start += step;
    }

    // Final window, clamped so t_max itself is covered (closed end).
    let final_start = t_max - width;
    segments.push(Segment {
        start: final_start,
        end: t_max,
        events: events_in(times, final_start, t_max, true),
    });

    segments
}

/// Event indices with `start <= t < end` (or `<= end` when closed),
/// found by binary search on the sorted timestamps.
fn events_in(times: &[f64], start: f64, end: f64, closed_end: bool) -> Vec<usize> {
    let lo = times.partition_point(|&t| t < start);
    let hi = if closed_end {
        times.partition_point(|&t| t <= end)
    } else {
        times.partition_point(|&t| t < end)
    };
    (lo..hi).collect()
}
