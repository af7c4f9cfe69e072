//! Extraction of structured advice from generative model output
//!
//! Model output is expected to be a JSON object with `Action_Advice` and
//! `Food_Recommendation`, often wrapped in a Markdown code fence. Anything
//! else degrades to free-text advice; parsing never fails.

use serde::Serialize;
use serde_json::{Map, Value};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Advice and food recommendation extracted from one model response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackResult {
    pub advice: String,
    pub food_name: String,
    pub food_reason: String,
}

/// Text left after fence stripping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stripped<'a> {
    /// No fence present, the whole text
    Plain(&'a str),
    /// Content between an opening marker and its closing fence
    Fenced(&'a str),
    /// Opening marker without a closing fence; text after the marker
    Unterminated(&'a str),
}

fn strip_fence(text: &str) -> Stripped<'_> {
    let marker = if text.contains(JSON_FENCE) {
        JSON_FENCE
    } else if text.contains(FENCE) {
        FENCE
    } else {
        return Stripped::Plain(text);
    };
    let Some(start) = text.find(marker).map(|i| i + marker.len()) else {
        return Stripped::Plain(text);
    };
    let rest = &text[start..];
    match rest.find(FENCE) {
        Some(end) => Stripped::Fenced(rest[..end].trim()),
        None => Stripped::Unterminated(rest.trim()),
    }
}

/// Parse raw generative output into a [`FeedbackResult`].
pub fn parse(raw: &str) -> FeedbackResult {
    let text = raw.trim();
    if text.is_empty() {
        return FeedbackResult::default();
    }

    let candidate = match strip_fence(text) {
        Stripped::Plain(s) | Stripped::Fenced(s) => s,
        Stripped::Unterminated(s) => {
            tracing::debug!("Unterminated code fence in feedback; using text as advice");
            return free_text(s);
        }
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => from_object(&object),
        Ok(_) | Err(_) => {
            tracing::debug!("Feedback is not a JSON object; using text as advice");
            free_text(candidate)
        }
    }
}

fn free_text(text: &str) -> FeedbackResult {
    FeedbackResult {
        advice: text.trim().to_string(),
        ..FeedbackResult::default()
    }
}

fn from_object(object: &Map<String, Value>) -> FeedbackResult {
    let string_field = |key: &str| object.get(key).and_then(Value::as_str).unwrap_or_default();
    let (food_name, food_reason) = split_food(string_field("Food_Recommendation"));
    FeedbackResult {
        advice: string_field("Action_Advice").to_string(),
        food_name,
        food_reason,
    }
}

/// Split a `"Food : Reason"` recommendation into name and reason.
///
/// Falls back to period-separated sentences, then to a bare name.
pub fn split_food(recommendation: &str) -> (String, String) {
    if recommendation.is_empty() {
        return (String::new(), String::new());
    }
    if let Some((name, reason)) = recommendation.split_once(':') {
        return (name.trim().to_string(), reason.trim().to_string());
    }
    if recommendation.contains('.') {
        let fragments: Vec<&str> = recommendation
            .split('.')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        return match fragments.as_slice() {
            [] => (String::new(), String::new()),
            [name] => (name.to_string(), String::new()),
            [name, rest @ ..] => (name.to_string(), rest.join(". ")),
        };
    }
    (recommendation.trim().to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(advice: &str, name: &str, reason: &str) -> FeedbackResult {
        FeedbackResult {
            advice: advice.to_string(),
            food_name: name.to_string(),
            food_reason: reason.to_string(),
        }
    }

    #[test]
    fn test_colon_recommendation() {
        let raw = r#"{"Action_Advice":"조언","Food_Recommendation":"라면 : 따뜻해서"}"#;
        assert_eq!(parse(raw), result("조언", "라면", "따뜻해서"));
    }

    #[test]
    fn test_split_on_first_colon_only() {
        assert_eq!(
            split_food("커피 : 시간 : 10시"),
            ("커피".to_string(), "시간 : 10시".to_string())
        );
    }

    #[test]
    fn test_period_recommendation() {
        assert_eq!(
            split_food("커피. 기분을 환기해줘서 좋아"),
            ("커피".to_string(), "기분을 환기해줘서 좋아".to_string())
        );
        assert_eq!(
            split_food("죽. 속이 편해. 몸이 따뜻해져."),
            ("죽".to_string(), "속이 편해. 몸이 따뜻해져".to_string())
        );
    }

    #[test]
    fn test_single_period_fragment() {
        assert_eq!(split_food("김밥."), ("김밥".to_string(), String::new()));
    }

    #[test]
    fn test_only_periods() {
        assert_eq!(split_food("..."), (String::new(), String::new()));
    }

    #[test]
    fn test_bare_name() {
        assert_eq!(split_food("초밥"), ("초밥".to_string(), String::new()));
        assert_eq!(split_food("  초밥  "), ("초밥".to_string(), String::new()));
    }

    #[test]
    fn test_free_text_is_advice() {
        assert_eq!(parse("그냥 잘 지내세요"), result("그냥 잘 지내세요", "", ""));
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(parse(""), FeedbackResult::default());
        assert_eq!(parse("   \n"), FeedbackResult::default());
    }

    #[test]
    fn test_json_fence() {
        let raw = "여기 있어요\n```json\n{\"Action_Advice\": \"산책해\", \"Food_Recommendation\": \"국밥 : 든든해\"}\n```\n끝";
        assert_eq!(parse(raw), result("산책해", "국밥", "든든해"));
    }

    #[test]
    fn test_generic_fence() {
        let raw = "```\n{\"Action_Advice\": \"물 마셔\"}\n```";
        assert_eq!(parse(raw), result("물 마셔", "", ""));
    }

    #[test]
    fn test_json_fence_preferred_over_generic() {
        let raw = "```\nnot json\n```\n```json\n{\"Action_Advice\": \"쉬어\"}\n```";
        assert_eq!(parse(raw), result("쉬어", "", ""));
    }

    #[test]
    fn test_unterminated_fence_falls_back() {
        let raw = "```json\n{\"Action_Advice\": \"쉬어\"}";
        assert_eq!(parse(raw), result("{\"Action_Advice\": \"쉬어\"}", "", ""));
    }

    #[test]
    fn test_malformed_json_in_fence() {
        let raw = "```json\n{\"Action_Advice\": \"쉬어\",\n```";
        assert_eq!(parse(raw), result("{\"Action_Advice\": \"쉬어\",", "", ""));
    }

    #[test]
    fn test_non_object_json_is_free_text() {
        assert_eq!(parse("[1, 2]"), result("[1, 2]", "", ""));
        assert_eq!(parse("\"문자열\""), result("\"문자열\"", "", ""));
    }

    #[test]
    fn test_missing_and_non_string_fields() {
        assert_eq!(parse("{}"), FeedbackResult::default());
        let raw = r#"{"Action_Advice": 3, "Food_Recommendation": ["라면"]}"#;
        assert_eq!(parse(raw), FeedbackResult::default());
    }

    #[test]
    fn test_empty_food_recommendation() {
        let raw = r#"{"Action_Advice":"자","Food_Recommendation":""}"#;
        assert_eq!(parse(raw), result("자", "", ""));
    }
}
