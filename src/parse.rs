// TRIALMON OUTPUT PARSER
// PULLS real/user/sys (FROM `time`) AND THE ROI TOTAL OUT OF WORKLOAD TEXT.
// PURE: NO I/O, NO LOGGING EXCEPT FOR SKIPPED UNTERMINATED SECTIONS.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::SectionMarkers;
use crate::error::ParseError;

pub const ROI_MARKER: &str = "Total time spent in ROI";

// total = 0 WHEN THE ROI LINE IS MISSING (FAILED OR INCOMPLETE TRIAL)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrialResult {
    pub iteration: u32,
    pub total: f64,
    pub real: Option<f64>,
    pub user: Option<f64>,
    pub sys: Option<f64>,
}

fn timing_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(real|user|sys)\s+(\S+)").expect("static regex"))
}

// "<minutes>m<seconds>s" -> SECONDS
pub fn parse_duration(s: &str) -> Result<f64, ParseError> {
    let (minutes, seconds) = s
        .split_once('m')
        .ok_or_else(|| ParseError::MalformedDuration(s.to_string()))?;
    let minutes: f64 = minutes
        .parse()
        .map_err(|_| ParseError::MalformedDuration(s.to_string()))?;
    let seconds: f64 = seconds
        .trim_end_matches('s')
        .parse()
        .map_err(|_| ParseError::MalformedDuration(s.to_string()))?;
    Ok(minutes * 60.0 + seconds)
}

// LAST TOKEN OF THE ROI LINE, UNIT SUFFIX STRIPPED ("1.0s" -> 1.0)
fn parse_roi(line: &str) -> Result<f64, ParseError> {
    let token = line.split_whitespace().last().unwrap_or("");
    let value = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    value
        .parse()
        .map_err(|_| ParseError::MalformedNumber(token.to_string()))
}

pub fn parse_section(text: &str) -> Result<TrialResult, ParseError> {
    let mut result = TrialResult::default();
    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = timing_line().captures(line) {
            let secs = parse_duration(&caps[2])?;
            match &caps[1] {
                "real" => result.real = Some(secs),
                "user" => result.user = Some(secs),
                _ => result.sys = Some(secs),
            }
        } else if line.contains(ROI_MARKER) {
            result.total = parse_roi(line)?;
        }
    }
    log::debug!("parsed result: {:?}", result);
    Ok(result)
}

// ONLY TEXT BETWEEN begin AND THE NEXT end IS PARSED. UNCLOSED FRAME IS SKIPPED.
pub fn parse_multi_section(
    log: &str,
    markers: &SectionMarkers,
) -> Result<Vec<TrialResult>, ParseError> {
    // AN EMPTY MARKER MATCHES EVERYWHERE AND NEVER ADVANCES
    if markers.begin.is_empty() || markers.end.is_empty() {
        return Err(ParseError::EmptyMarker);
    }
    let mut results = Vec::new();
    let mut rest = log;
    while let Some(start) = rest.find(&markers.begin) {
        let body_start = start + markers.begin.len();
        let after = &rest[body_start..];
        let end = match after.find(&markers.end) {
            Some(e) => e,
            None => {
                log::warn!("unterminated output section skipped");
                break;
            }
        };
        let mut result = parse_section(&after[..end])?;
        result.iteration = results.len() as u32 + 1;
        results.push(result);
        rest = &after[end + markers.end.len()..];
    }
    Ok(results)
}
