// TRIALMON AGGREGATION TESTS
// SUMMARY STATISTICS AND THE PROCESSED/SUMMARY CSV FILES.

use trialmon::parse::TrialResult;
use trialmon::report::{read_processed, write_processed, write_summary};
use trialmon::stats::summarize;
use trialmon::StatsError;

fn trial(iteration: u32, total: f64, real: f64, user: f64, sys: f64) -> TrialResult {
    TrialResult { iteration, total, real: Some(real), user: Some(user), sys: Some(sys) }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// === SUMMARIZE ===

#[test]
fn two_trials() {
    let s = summarize(&[trial(1, 2.0, 2.0, 2.0, 1.0), trial(2, 4.0, 4.0, 4.0, 1.0)]).unwrap();
    assert_eq!(s.average.total, 3.0);
    assert_eq!(s.max.total, 4.0);
    assert_eq!(s.min.total, 2.0);
    assert!(close(s.stdev.total, 2f64.sqrt()));
    // CONSTANT FIELD HAS ZERO SPREAD
    assert_eq!(s.stdev.sys, 0.0);
    assert_eq!(s.average.sys, 1.0);
}

#[test]
fn single_trial_has_zero_stdev() {
    let s = summarize(&[trial(1, 7.5, 8.0, 6.0, 0.3)]).unwrap();
    assert_eq!(s.stdev.total, 0.0);
    assert_eq!(s.stdev.real, 0.0);
    assert_eq!(s.stdev.user, 0.0);
    assert_eq!(s.stdev.sys, 0.0);
    assert_eq!(s.average.real, 8.0);
    assert_eq!(s.max.real, 8.0);
    assert_eq!(s.min.real, 8.0);
}

#[test]
fn sample_stdev_uses_n_minus_one() {
    // 2, 4, 4, 4, 5, 5, 7, 9 -> SAMPLE VARIANCE 32/7
    let totals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    let trials: Vec<TrialResult> = totals
        .iter()
        .enumerate()
        .map(|(i, &t)| trial(i as u32 + 1, t, t, t, t))
        .collect();
    let s = summarize(&trials).unwrap();
    assert_eq!(s.average.total, 5.0);
    assert!(close(s.stdev.total, (32.0f64 / 7.0).sqrt()));
}

#[test]
fn empty_input_fails_fast() {
    assert_eq!(summarize(&[]), Err(StatsError::Empty));
}

// === FILES ===

#[test]
fn processed_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k--canneal-processed.csv");
    let trials = vec![
        trial(1, 12.345, 15.01, 48.2, 1.75),
        trial(2, 0.0, 0.731, 0.1, 0.003),
        TrialResult { iteration: 3, total: 11.9, real: Some(14.5), user: None, sys: Some(1.8) },
    ];
    write_processed(&path, &trials).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("iteration,total,real,user,sys\n"));

    let back = read_processed(&path).unwrap();
    assert_eq!(back.len(), trials.len());
    for (a, b) in trials.iter().zip(back.iter()) {
        assert_eq!(a.iteration, b.iteration);
        assert!(close(a.total, b.total));
        assert_eq!(a.real.is_some(), b.real.is_some());
        assert_eq!(a.user.is_some(), b.user.is_some());
        assert!(close(a.real.unwrap_or(0.0), b.real.unwrap_or(0.0)));
        assert!(close(a.user.unwrap_or(0.0), b.user.unwrap_or(0.0)));
        assert!(close(a.sys.unwrap_or(0.0), b.sys.unwrap_or(0.0)));
    }
}

#[test]
fn summary_file_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k--canneal-summary.csv");
    let s = summarize(&[trial(1, 2.0, 2.0, 2.0, 1.0), trial(2, 4.0, 4.0, 4.0, 1.0)]).unwrap();
    write_summary(&path, &s).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], ",total,real,user,sys");
    assert_eq!(lines[1], "average,3,3,3,1");
    assert_eq!(lines[2], "max,4,4,4,1");
    assert_eq!(lines[3], "min,2,2,2,1");
    assert!(lines[4].starts_with("stdev,1.414"));
}
