//! Tolerant parsing of analysis replies.
//!
//! The analysis service is a text generator and does not always honor the
//! structured shape. Replies are tried, in order, as:
//! - strict JSON
//! - JSON inside a fenced code block
//! - the outermost `{ ... }` span
//! - individual `"field": value` pairs
//! - plain prose, used as the feedback text

use regex::Regex;
use tracing::debug;
use crate::AnalysisResponse;

const STRING_FIELDS: [&str; 4] = [
    "feedbackText",
    "analysisText",
    "recommendedNextMissionText",
    "progressReason",
];

/// Turn a raw reply into a response, never failing.
pub fn repair_analysis(raw: &str, default_feedback: &str) -> AnalysisResponse {
    let trimmed = raw.trim();

    for candidate in json_candidates(trimmed) {
        if let Ok(response) = serde_json::from_str::<AnalysisResponse>(candidate) {
            return response.with_default_feedback(default_feedback);
        }
    }

    if let Some(response) = extract_fields(trimmed) {
        debug!("Recovered analysis fields from malformed JSON");
        return response.with_default_feedback(default_feedback);
    }

    let prose = strip_fences(trimmed);
    if prose.is_empty() || prose.starts_with('{') || prose.starts_with('[') {
        debug!("Analysis reply unusable, using default feedback");
        return AnalysisResponse::feedback(default_feedback);
    }

    debug!("Using prose analysis reply as feedback ({} chars)", prose.len());
    AnalysisResponse::feedback(prose)
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Ok(re) = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```") {
        if let Some(block) = re.captures(text).and_then(|c| c.get(1)) {
            candidates.push(block.as_str());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

fn extract_fields(text: &str) -> Option<AnalysisResponse> {
    let mut response = AnalysisResponse::feedback("");
    let mut found = false;

    for field in STRING_FIELDS {
        let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, field);
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let Some(value) = re.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let value = unescape(value.as_str());
        match field {
            "feedbackText" => response.feedback_text = value,
            "analysisText" => response.analysis_text = value,
            "recommendedNextMissionText" => response.recommended_next_mission_text = Some(value),
            _ => response.progress_reason = Some(value),
        }
        found = true;
    }

    if let Ok(re) = Regex::new(r#""shouldProgress"\s*:\s*(true|false)"#) {
        if let Some(flag) = re.captures(text).and_then(|c| c.get(1)) {
            response.should_progress = Some(flag.as_str() == "true");
        }
    }

    let has_text = !response.feedback_text.is_empty() || !response.analysis_text.is_empty();
    (found && has_text).then_some(response)
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "기본 피드백";

    #[test]
    fn test_strict_json() {
        let raw = r#"{"success":true,"feedbackText":"좋아요","analysisText":"분석","shouldProgress":false}"#;
        let response = repair_analysis(raw, DEFAULT);
        assert_eq!(response.feedback_text, "좋아요");
        assert_eq!(response.should_progress, Some(false));
    }

    #[test]
    fn test_fenced_json_with_preamble() {
        let raw = "여기 결과입니다:\n```json\n{\"feedbackText\": \"잘 하셨어요\", \"recommendedNextMissionText\": \"하늘 보기\"}\n```";
        let response = repair_analysis(raw, DEFAULT);
        assert_eq!(response.feedback_text, "잘 하셨어요");
        assert_eq!(response.next_mission(), Some("하늘 보기"));
    }

    #[test]
    fn test_truncated_json_recovers_fields() {
        let raw = r#"{"feedbackText": "따뜻한 \"하루\"였네요", "analysisText": "감정이 안정적", "shouldProgress": true, "recommendedNext"#;
        let response = repair_analysis(raw, DEFAULT);
        assert_eq!(response.feedback_text, "따뜻한 \"하루\"였네요");
        assert_eq!(response.analysis_text, "감정이 안정적");
        assert_eq!(response.should_progress, Some(true));
        assert!(response.recommended_next_mission_text.is_none());
    }

    #[test]
    fn test_prose_becomes_feedback() {
        let response = repair_analysis("오늘도 충분히 잘 해냈어요.", DEFAULT);
        assert!(response.success);
        assert_eq!(response.feedback_text, "오늘도 충분히 잘 해냈어요.");
        assert!(response.should_advance());
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        assert_eq!(repair_analysis("", DEFAULT).feedback_text, DEFAULT);
        assert_eq!(repair_analysis("{\"oops\": ", DEFAULT).feedback_text, DEFAULT);
    }

    #[test]
    fn test_empty_feedback_in_valid_json_uses_default() {
        let response = repair_analysis(r#"{"analysisText": "a"}"#, DEFAULT);
        assert_eq!(response.feedback_text, DEFAULT);
        assert_eq!(response.analysis_text, "a");
    }
}
