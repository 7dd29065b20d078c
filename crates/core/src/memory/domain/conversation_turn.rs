use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One exchange: what the person said and what was answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(with = "turn_timestamp")]
    pub timestamp: NaiveDateTime,
    pub user: String,
    pub bot: String,
}

impl ConversationTurn {
    pub fn new(timestamp: NaiveDateTime, user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            timestamp,
            user: user.into(),
            bot: bot.into(),
        }
    }

    pub fn now(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self::new(chrono::Local::now().naive_local(), user, bot)
    }
}

/// Serializes timestamps as `2024-05-01 18:30:00`.
mod turn_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
