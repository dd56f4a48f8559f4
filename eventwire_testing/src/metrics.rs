//! Readers over `metrics_util::debugging` snapshots.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder and the snapshotter observing it.
#[must_use]
pub fn debugging_recorder() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Sum of every counter called `name` whose labels include `label`.
///
/// Passing `None` for `label` sums all label sets.
#[must_use]
pub fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| {
            key.key().name() == name
                && label.is_none_or(|(k, v)| {
                    key.key()
                        .labels()
                        .any(|l| l.key() == k && l.value() == v)
                })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

/// Current value of the gauge called `name`, if it was ever touched.
#[must_use]
pub fn gauge(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Gauge(g) if key.key().name() == name => Some(g.into_inner()),
            _ => None,
        })
}
