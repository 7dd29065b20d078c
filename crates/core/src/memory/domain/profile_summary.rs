use serde_json::Value;

/// Structured facts extracted from a model-written session summary.
///
/// Parsing is lenient: models return numbers for ages, lists for single
/// traits or `null` for unknowns, and all of that is accepted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileSummary {
    pub summary: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub occupation: Option<String>,
    pub interests: Vec<String>,
    pub personality: Option<String>,
    pub goals: Vec<String>,
}

impl ProfileSummary {
    /// Parses the first JSON object found in a model response.
    pub fn from_response(response: &str) -> Option<Self> {
        let json = extract_json_object(response)?;
        let value: Value = serde_json::from_str(json).ok()?;
        let obj = value.as_object()?;

        Some(Self {
            summary: obj.get("summary").and_then(as_text),
            gender: obj.get("gender").and_then(as_text),
            age: obj.get("age").and_then(as_text),
            occupation: obj.get("occupation").and_then(as_text),
            interests: obj.get("interests").map(as_list).unwrap_or_default(),
            personality: obj.get("personality").and_then(as_text),
            goals: obj.get("goals").map(as_list).unwrap_or_default(),
        })
    }
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(as_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
