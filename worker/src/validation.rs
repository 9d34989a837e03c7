use serde_json::{Map, Value};

use crate::error::{JobError, NO_TEXT};

pub const DEFAULT_SPEED: f32 = 1.0;

/// One job's validated input.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

/// Limits applied while reading a job.
#[derive(Debug, Clone)]
pub struct InputRules {
    pub default_voice: String,
    pub max_text_length: usize,
}

/// Read `text`/`prompt`, `voice` and `speed` out of a job's `input` object.
pub fn parse_job_input(job: &Value, rules: &InputRules) -> Result<JobRequest, JobError> {
    let input = job
        .get("input")
        .and_then(Value::as_object)
        .ok_or_else(|| JobError::Input("job has no input object".to_string()))?;

    let text = match optional_str(input, "text")? {
        Some(text) => Some(text),
        None => optional_str(input, "prompt")?,
    }
    .map(str::trim)
    .unwrap_or_default();
    if text.is_empty() {
        return Err(JobError::Input(NO_TEXT.to_string()));
    }
    let length = text.chars().count();
    if length > rules.max_text_length {
        return Err(JobError::Input(format!(
            "Text too long ({length} characters, max {})",
            rules.max_text_length
        )));
    }

    let voice = optional_str(input, "voice")?
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(rules.default_voice.as_str())
        .to_string();

    let speed = parse_speed(input.get("speed"))?;

    Ok(JobRequest {
        text: text.to_string(),
        voice,
        speed,
    })
}

fn optional_str<'a>(input: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, JobError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(JobError::Input(format!(
            "'{key}' must be a string, got {}",
            type_name(other)
        ))),
    }
}

/// Speed must be a finite positive number. Numeric strings are accepted.
fn parse_speed(value: Option<&Value>) -> Result<f32, JobError> {
    let speed = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_SPEED),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    // Check after narrowing: tiny positives round to 0.0 and huge ones to inf.
    match speed.map(|s| s as f32) {
        Some(s) if s.is_finite() && s > 0.0 => Ok(s),
        _ => Err(JobError::Input(format!(
            "Invalid speed {}: expected a positive number",
            value.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> InputRules {
        InputRules {
            default_voice: "af_bella".to_string(),
            max_text_length: 50,
        }
    }

    fn parse(job: Value) -> Result<JobRequest, JobError> {
        parse_job_input(&job, &rules())
    }

    #[test]
    fn test_defaults_and_trimming() {
        let req = parse(json!({"input": {"text": "  Hello world \n"}})).unwrap();
        assert_eq!(
            req,
            JobRequest {
                text: "Hello world".to_string(),
                voice: "af_bella".to_string(),
                speed: 1.0,
            }
        );
    }

    #[test]
    fn test_prompt_is_an_alias_for_text() {
        let req = parse(json!({"input": {"prompt": "Hi", "voice": "am_adam", "speed": 1.25}})).unwrap();
        assert_eq!(req.text, "Hi");
        assert_eq!(req.voice, "am_adam");
        assert_eq!(req.speed, 1.25);
    }

    #[test]
    fn test_text_wins_over_prompt() {
        let req = parse(json!({"input": {"text": "from text", "prompt": "from prompt"}})).unwrap();
        assert_eq!(req.text, "from text");
    }

    #[test]
    fn test_empty_or_whitespace_text_is_no_text() {
        for input in [json!({}), json!({"text": ""}), json!({"text": "   \t"}), json!({"text": null})] {
            let err = parse(json!({ "input": input })).unwrap_err();
            assert_eq!(err.describe(), "No text provided");
        }
    }

    #[test]
    fn test_empty_text_is_reported_before_bad_speed() {
        let err = parse(json!({"input": {"text": " ", "speed": "fast"}})).unwrap_err();
        assert_eq!(err.describe(), "No text provided");
    }

    #[test]
    fn test_speed_as_numeric_string() {
        let req = parse(json!({"input": {"text": "a", "speed": " 0.8 "}})).unwrap();
        assert_eq!(req.speed, 0.8);
    }

    #[test]
    fn test_invalid_speeds_are_rejected() {
        for speed in [json!("fast"), json!(0), json!(-1.5), json!(true), json!([1]), json!("NaN"), json!("inf"), json!(1e-60), json!("1e-60"), json!(1e300)] {
            let err = parse(json!({"input": {"text": "a", "speed": speed}})).unwrap_err();
            assert!(matches!(err, JobError::Input(_)), "speed {speed} accepted");
            assert!(err.describe().starts_with("InputError: Invalid speed"));
        }
    }

    #[test]
    fn test_blank_voice_uses_default() {
        let req = parse(json!({"input": {"text": "a", "voice": "  "}})).unwrap();
        assert_eq!(req.voice, "af_bella");
    }

    #[test]
    fn test_non_string_fields_are_rejected() {
        assert!(parse(json!({"input": {"text": 42}})).is_err());
        assert!(parse(json!({"input": {"text": "a", "voice": 3}})).is_err());
    }

    #[test]
    fn test_missing_input_object() {
        let err = parse(json!({"id": "x"})).unwrap_err();
        assert!(err.describe().contains("no input"));
        assert!(parse(json!({"input": "text"})).is_err());
    }

    #[test]
    fn test_text_too_long() {
        let err = parse(json!({"input": {"text": "a".repeat(51)}})).unwrap_err();
        assert!(err.describe().contains("too long"));
        assert!(parse(json!({"input": {"text": "é".repeat(50)}})).is_ok());
    }
}
