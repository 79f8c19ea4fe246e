// TRIALMON STATISTICS AGGREGATOR
// MEAN / MAX / MIN / SAMPLE STDEV, EACH TIMING FIELD INDEPENDENTLY.
// ALL RESULTS IN ONE CALL MUST COME FROM THE SAME WORKLOAD (NOT CHECKED).

use crate::error::StatsError;
use crate::parse::TrialResult;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timings {
    pub total: f64,
    pub real: f64,
    pub user: f64,
    pub sys: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRecord {
    pub average: Timings,
    pub max: Timings,
    pub min: Timings,
    pub stdev: Timings,
}

impl SummaryRecord {
    pub fn rows(&self) -> [(&'static str, Timings); 4] {
        [
            ("average", self.average),
            ("max", self.max),
            ("min", self.min),
            ("stdev", self.stdev),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct FieldStats {
    mean: f64,
    max: f64,
    min: f64,
    stdev: f64,
}

// ABSENT VALUES ARE LEFT OUT. NO OBSERVATIONS -> ALL ZERO.
fn field_stats(values: impl Iterator<Item = f64>) -> FieldStats {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return FieldStats::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    // SAMPLE VARIANCE (n - 1), UNDEFINED BELOW TWO
    let stdev = if values.len() < 2 {
        0.0
    } else {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    };
    FieldStats { mean, max, min, stdev }
}

pub fn summarize(results: &[TrialResult]) -> Result<SummaryRecord, StatsError> {
    if results.is_empty() {
        return Err(StatsError::Empty);
    }

    let fields = [
        field_stats(results.iter().map(|r| r.total)),
        field_stats(results.iter().filter_map(|r| r.real)),
        field_stats(results.iter().filter_map(|r| r.user)),
        field_stats(results.iter().filter_map(|r| r.sys)),
    ];

    Ok(SummaryRecord {
        average: pick(&fields, |s| s.mean),
        max: pick(&fields, |s| s.max),
        min: pick(&fields, |s| s.min),
        stdev: pick(&fields, |s| s.stdev),
    })
}

// [total, real, user, sys]
fn pick(fields: &[FieldStats; 4], f: fn(&FieldStats) -> f64) -> Timings {
    Timings {
        total: f(&fields[0]),
        real: f(&fields[1]),
        user: f(&fields[2]),
        sys: f(&fields[3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(total: f64, real: f64, user: f64, sys: f64) -> TrialResult {
        TrialResult { iteration: 0, total, real: Some(real), user: Some(user), sys: Some(sys) }
    }

    #[test]
    fn fields_are_independent() {
        // MAX total AND MAX user COME FROM DIFFERENT TRIALS
        let s = summarize(&[trial(5.0, 1.0, 1.0, 0.1), trial(1.0, 1.0, 9.0, 0.1)]).unwrap();
        assert_eq!(s.max.total, 5.0);
        assert_eq!(s.max.user, 9.0);
        assert_eq!(s.min.total, 1.0);
        assert_eq!(s.min.user, 1.0);
    }

    #[test]
    fn absent_fields_skipped() {
        let partial = TrialResult { iteration: 2, total: 0.0, real: None, user: None, sys: None };
        let s = summarize(&[trial(2.0, 4.0, 3.0, 1.0), partial]).unwrap();
        assert_eq!(s.average.real, 4.0);
        assert_eq!(s.stdev.real, 0.0);
        // total ALWAYS COUNTS, A FAILED TRIAL CONTRIBUTES 0
        assert_eq!(s.average.total, 1.0);
    }

    #[test]
    fn no_observations_reports_zero() {
        let only_total = TrialResult { iteration: 1, total: 3.0, ..Default::default() };
        let s = summarize(&[only_total]).unwrap();
        assert_eq!(s.average.sys, 0.0);
        assert_eq!(s.max.sys, 0.0);
        assert_eq!(s.min.sys, 0.0);
    }

    #[test]
    fn rows_are_labeled_in_order() {
        let s = summarize(&[trial(1.0, 1.0, 1.0, 1.0)]).unwrap();
        let labels: Vec<&str> = s.rows().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["average", "max", "min", "stdev"]);
    }
}
