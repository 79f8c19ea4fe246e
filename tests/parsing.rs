// TRIALMON OUTPUT PARSER TESTS
// TIMING LINES, ROI TOTAL, SECTION FRAMING, FORMAT DRIFT.
// PURE TEXT IN, RECORDS OUT. RUN OFFLINE.

use trialmon::config::{SectionMarkers, PARSEC_BEGIN_MARKER, PARSEC_END_MARKER};
use trialmon::parse::{parse_multi_section, parse_section, TrialResult};
use trialmon::ParseError;

const FULL_SECTION: &str = "\
[HOOKS] PARSEC Hooks Version 1.2
[HOOKS] Entering ROI
[HOOKS] Leaving ROI
[HOOKS] Total time spent in ROI: 1.0s
[HOOKS] Terminating

real\t0m1.500s
user\t0m1.000s
sys\t0m0.200s
";

fn framed(body: &str) -> String {
    format!("{}\n{}\n{}\n", PARSEC_BEGIN_MARKER, body, PARSEC_END_MARKER)
}

// === SINGLE SECTION ===

#[test]
fn section_all_fields() {
    let r = parse_section(FULL_SECTION).unwrap();
    assert_eq!(r.real, Some(1.5));
    assert_eq!(r.user, Some(1.0));
    assert_eq!(r.sys, Some(0.2));
    assert_eq!(r.total, 1.0);
}

#[test]
fn section_space_separated_timing() {
    let text = "real 0m1.500s\nuser 0m1.000s\nsys 0m0.200s\nTotal time spent in ROI: 1.0s\n";
    let r = parse_section(text).unwrap();
    assert_eq!(
        r,
        TrialResult { iteration: 0, total: 1.0, real: Some(1.5), user: Some(1.0), sys: Some(0.2) }
    );
}

#[test]
fn section_without_roi_defaults_total_to_zero() {
    // FAILED BENCHMARK: `time` STILL REPORTS, HOOKS NEVER PRINT THE ROI
    let text = "real 0m1.500s\nuser 0m1.000s\nsys 0m0.200s\n";
    let r = parse_section(text).unwrap();
    assert_eq!(r.total, 0.0);
    assert_eq!(r.real, Some(1.5));
    assert_eq!(r.user, Some(1.0));
    assert_eq!(r.sys, Some(0.2));
}

#[test]
fn section_minutes_convert_to_seconds() {
    let r = parse_section("real\t3m2.500s\n").unwrap();
    assert_eq!(r.real, Some(182.5));
}

#[test]
fn section_missing_lines_are_absent() {
    let r = parse_section("nothing useful here\n").unwrap();
    assert_eq!(r, TrialResult::default());
}

#[test]
fn malformed_duration_is_fatal() {
    let err = parse_section("real 1.500s\nTotal time spent in ROI: 1.0s\n").unwrap_err();
    assert_eq!(err, ParseError::MalformedDuration("1.500s".to_string()));
}

// === MULTI SECTION ===

#[test]
fn multi_section_skips_unframed_noise() {
    let log = format!(
        "[PARSEC] Benchmarks to run:  parsec.blackscholes\n\
         [PARSEC] Setting up run directory.\n\
         {}\
         [PARSEC] Done.\n\n\
         {}",
        framed(FULL_SECTION),
        framed("real 0m2.000s\nuser 0m3.000s\nsys 0m0.500s\nTotal time spent in ROI: 1.9s\n"),
    );
    let results = parse_multi_section(&log, &SectionMarkers::default()).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].iteration, 1);
    assert_eq!(results[0].total, 1.0);
    assert_eq!(results[1].iteration, 2);
    assert_eq!(results[1].real, Some(2.0));
    assert_eq!(results[1].total, 1.9);
}

#[test]
fn multi_section_ignores_timing_outside_frames() {
    // `real` LINE AFTER THE END MARKER BELONGS TO NO TRIAL
    let log = format!("{}real 0m9.000s\n", framed("user 0m1.000s\n"));
    let results = parse_multi_section(&log, &SectionMarkers::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].real, None);
    assert_eq!(results[0].user, Some(1.0));
}

#[test]
fn multi_section_unterminated_is_skipped() {
    let log = format!("{}{}\nreal 0m1.000s\n", framed(FULL_SECTION), PARSEC_BEGIN_MARKER);
    let results = parse_multi_section(&log, &SectionMarkers::default()).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn multi_section_no_frames() {
    let results = parse_multi_section("just noise\n", &SectionMarkers::default()).unwrap();
    assert!(results.is_empty());
}

#[test]
fn multi_section_propagates_drift() {
    let log = framed("real 0.5s\n");
    assert!(matches!(
        parse_multi_section(&log, &SectionMarkers::default()),
        Err(ParseError::MalformedDuration(_))
    ));
}

#[test]
fn empty_markers_are_rejected() {
    let both = SectionMarkers { begin: String::new(), end: String::new() };
    assert_eq!(parse_multi_section("x", &both), Err(ParseError::EmptyMarker));

    let no_end = SectionMarkers { begin: PARSEC_BEGIN_MARKER.to_string(), end: String::new() };
    assert_eq!(
        parse_multi_section(&framed(FULL_SECTION), &no_end),
        Err(ParseError::EmptyMarker)
    );
}
