//! Window calculator.
//!
//! Pure and stateless: maps a source's current duration onto the set of
//! complete, non-overlapping analysis windows. Re-invoking it on every
//! scan is expected; dedup lives in the job store's upsert, not here.

/// One analysis window, carrying both the addressing-scheme bounds used to
/// fetch the segment and the source-relative bounds used for dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisWindow {
    /// Bounds in the scheme the transport addresses by (absolute program
    /// time for live sources, asset-relative for finished ones).
    pub start: i64,
    pub end: i64,
    /// Always source-relative.
    pub relative_start: i64,
    pub relative_end: i64,
}

/// All complete windows `[i*W, (i+1)*W)` that fit in `duration_secs`.
///
/// A duration shorter than one window yields nothing - not an error, just
/// "nothing ready yet". The trailing partial window is never emitted.
pub fn complete_windows(duration_secs: i64, window_secs: i64) -> Vec<AnalysisWindow> {
    if window_secs <= 0 || duration_secs < window_secs {
        return Vec::new();
    }

    let count = duration_secs / window_secs;
    (0..count)
        .map(|i| {
            let start = i * window_secs;
            let end = (i + 1) * window_secs;
            AnalysisWindow {
                start,
                end,
                relative_start: start,
                relative_end: end,
            }
        })
        .collect()
}

/// Windows for a source, projected into the right addressing scheme.
///
/// Live segment addressing needs absolute program time, so each relative
/// window is shifted by the source's start epoch; the relative pair is
/// kept untouched as the dedupe key. Finished sources address relatively,
/// so both pairs coincide.
pub fn windows_for_source(
    duration_secs: i64,
    is_live: bool,
    window_secs: i64,
    start_epoch: i64,
) -> Vec<AnalysisWindow> {
    let mut windows = complete_windows(duration_secs, window_secs);
    if is_live {
        for w in &mut windows {
            w.start += start_epoch;
            w.end += start_epoch;
        }
    }
    windows
}
