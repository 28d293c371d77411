use std::fmt;

/// Untyped per-kind payload carried by a record.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Declared kind of a record.
///
/// The vocabulary is open-ended: anything the agent sends that is not listed
/// here is kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    AttemptStart,
    Decision,
    /// Either `evaluation` or `evaluation_result` on the wire.
    Evaluation,
    EvaluationResult,
    PromptUpdated,
    Countdown,
    PriceUpdate,
    Success,
    Failure,
    Complete,
    Error,
    Other(String),
}

impl EventKind {
    /// Maps a wire `type` tag to a kind. Never fails.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "status" => Self::Status,
            "attempt_start" => Self::AttemptStart,
            "decision" => Self::Decision,
            "evaluation" => Self::Evaluation,
            "evaluation_result" => Self::EvaluationResult,
            "prompt_updated" => Self::PromptUpdated,
            "countdown" => Self::Countdown,
            "price_update" => Self::PriceUpdate,
            "success" => Self::Success,
            "failure" => Self::Failure,
            "complete" => Self::Complete,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::AttemptStart => "attempt_start",
            Self::Decision => "decision",
            Self::Evaluation => "evaluation",
            Self::EvaluationResult => "evaluation_result",
            Self::PromptUpdated => "prompt_updated",
            Self::Countdown => "countdown",
            Self::PriceUpdate => "price_update",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Other(tag) => tag,
        }
    }

    /// True for both spellings of an evaluation record.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, Self::Evaluation | Self::EvaluationResult)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl serde::Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}

/// One decoded message from the agent's stream.
///
/// Payload fields depend on `kind` and are never guaranteed to be present;
/// use the typed accessors, which return `None` on a missing or mistyped field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "data", default)]
    pub payload: Payload,
    /// Producer-side timestamp, when the agent attaches one. Non-numeric
    /// values are ignored rather than rejecting the record.
    #[serde(
        rename = "timestamp",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub emitted_at: Option<f64>,
}

fn lenient_timestamp<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = <Option<serde_json::Value> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()))
}

impl EventRecord {
    /// Creates a record without a producer timestamp.
    pub fn new(kind: impl Into<EventKind>, payload: Payload) -> Self {
        Self {
            kind: kind.into(),
            payload,
            emitted_at: None,
        }
    }

    /// Builds a record from a JSON value; non-object values yield an empty payload.
    pub fn from_json(kind: impl Into<EventKind>, payload: serde_json::Value) -> Self {
        let payload = match payload {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        };
        Self::new(kind, payload)
    }

    /// Builds an `error` record with a single `message` field.
    pub fn error(message: impl Into<String>) -> Self {
        let mut payload = Payload::new();
        payload.insert("message".into(), serde_json::Value::String(message.into()));
        Self::new(EventKind::Error, payload)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(|v| v.as_u64())
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(|v| v.as_bool())
    }
}
