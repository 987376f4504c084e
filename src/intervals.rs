//! Static interval detection over tagged sample sequences
//!
//! A motion classifier (variance thresholding, an external annotation tool,
//! ...) tags each sample with the id of the static interval it belongs to
//! before these routines run. Detection itself is a pure scan over an
//! explicit slice: no internal state, no output other than the interval
//! list. Diagnostics go through `log`.

use log::debug;
use nalgebra::Vector3;

use crate::types::{DataInterval, TriadSample};

/// Group consecutive samples sharing an interval id into [`DataInterval`]s
///
/// Performs a single linear scan: whenever the interval id changes, the
/// open interval is closed and emitted and a new one is opened at the
/// current index. The final open interval is always emitted, so an empty
/// input produces one degenerate interval with both bounds at
/// [`DataInterval::UNSET`] — callers must discard it.
///
/// Output intervals appear in first-seen order, one per maximal run of
/// equal ids; identical input always yields the identical list.
///
/// # Panics
/// Every sample must carry a non-negative interval id. Untagged samples
/// reaching the detector are a caller bug: filter them out beforehand.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_calib::{DataInterval, TriadSample, static_intervals_detector};
///
/// let samples: Vec<TriadSample> = [0, 0, 0, 1, 1]
///     .iter()
///     .enumerate()
///     .map(|(i, &id)| TriadSample::tagged(i as f64 * 0.01, Vector3::zeros(), id))
///     .collect();
///
/// let intervals = static_intervals_detector(&samples);
/// assert_eq!(intervals, vec![DataInterval::new(0, 2), DataInterval::new(3, 4)]);
/// ```
pub fn static_intervals_detector(samples: &[TriadSample]) -> Vec<DataInterval> {
    let mut intervals = Vec::new();
    let mut current_interval = DataInterval::default();
    let mut previous_id = TriadSample::UNTAGGED;

    for (i, sample) in samples.iter().enumerate() {
        assert!(
            sample.interval_id() >= 0,
            "sample {i} reached the static interval detector with a negative interval id"
        );

        if sample.interval_id() != previous_id {
            if current_interval.is_open() {
                intervals.push(current_interval);
            }
            current_interval.start_idx = i as isize;
            previous_id = sample.interval_id();
        }

        current_interval.end_idx = i as isize;
    }
    intervals.push(current_interval);

    debug!(
        "static interval detection: {} samples -> {} intervals",
        samples.len(),
        intervals.len()
    );

    intervals
}

/// Arithmetic mean of an interval's sample payloads
///
/// Returns the zero vector for an unopened or empty interval.
pub fn interval_mean(samples: &[TriadSample], interval: &DataInterval) -> Vector3<f64> {
    let count = interval.sample_count();
    if count == 0 {
        return Vector3::zeros();
    }

    let mut sum = Vector3::zeros();
    for index in interval.indices() {
        sum += samples[index].data();
    }
    sum / count as f64
}

/// The sample at the middle of an interval
///
/// Meaningful only for opened intervals with in-range indices.
pub fn central_sample<'a>(
    samples: &'a [TriadSample],
    interval: &DataInterval,
) -> &'a TriadSample {
    &samples[interval.central_index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_sequence(ids: &[i32]) -> Vec<TriadSample> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| {
                TriadSample::tagged(i as f64 * 0.01, Vector3::new(i as f64, 0.0, 0.0), id)
            })
            .collect()
    }

    #[test]
    fn test_detects_maximal_runs_in_order() {
        let samples = tagged_sequence(&[0, 0, 0, 1, 1, 2, 2, 2, 2]);
        let intervals = static_intervals_detector(&samples);

        assert_eq!(
            intervals,
            vec![
                DataInterval::new(0, 2),
                DataInterval::new(3, 4),
                DataInterval::new(5, 8),
            ]
        );
    }

    #[test]
    fn test_single_run() {
        let samples = tagged_sequence(&[7, 7, 7, 7]);
        let intervals = static_intervals_detector(&samples);
        assert_eq!(intervals, vec![DataInterval::new(0, 3)]);
    }

    #[test]
    fn test_reused_id_opens_a_new_interval() {
        // A non-adjacent repeat of an id is a distinct run.
        let samples = tagged_sequence(&[0, 0, 1, 0, 0]);
        let intervals = static_intervals_detector(&samples);
        assert_eq!(
            intervals,
            vec![
                DataInterval::new(0, 1),
                DataInterval::new(2, 2),
                DataInterval::new(3, 4),
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_degenerate_interval() {
        let intervals = static_intervals_detector(&[]);
        assert_eq!(intervals.len(), 1);
        assert!(!intervals[0].is_open());
        assert_eq!(intervals[0].start_idx, DataInterval::UNSET);
        assert_eq!(intervals[0].end_idx, DataInterval::UNSET);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let samples = tagged_sequence(&[3, 3, 1, 1, 1, 4, 4, 4, 4, 2]);
        assert_eq!(
            static_intervals_detector(&samples),
            static_intervals_detector(&samples)
        );
    }

    #[test]
    #[should_panic(expected = "negative interval id")]
    fn test_untagged_sample_fails_fast() {
        let samples = vec![
            TriadSample::tagged(0.0, Vector3::zeros(), 0),
            TriadSample::new(0.01, Vector3::zeros()),
        ];
        static_intervals_detector(&samples);
    }

    #[test]
    fn test_interval_mean() {
        let samples = tagged_sequence(&[0, 0, 0, 0]);
        // Payload x components are 0, 1, 2, 3
        let mean = interval_mean(&samples, &DataInterval::new(0, 3));
        assert_eq!(mean, Vector3::new(1.5, 0.0, 0.0));

        let partial = interval_mean(&samples, &DataInterval::new(1, 2));
        assert_eq!(partial, Vector3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_interval_mean_of_degenerate_interval_is_zero() {
        let samples = tagged_sequence(&[0]);
        assert_eq!(
            interval_mean(&samples, &DataInterval::default()),
            Vector3::zeros()
        );
    }

    #[test]
    fn test_central_sample() {
        let samples = tagged_sequence(&[0, 0, 0, 0, 0]);
        let central = central_sample(&samples, &DataInterval::new(0, 4));
        assert_eq!(central.data().x, 2.0);

        // Even-length intervals round the midpoint down
        let central = central_sample(&samples, &DataInterval::new(0, 3));
        assert_eq!(central.data().x, 1.0);
    }
}
