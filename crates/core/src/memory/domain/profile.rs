use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::conversation_turn::ConversationTurn;
use super::profile_summary::ProfileSummary;

/// Turns of the last session kept on the profile after summarization.
pub const RECENT_TURNS_KEPT: usize = 5;

/// Long-term memory about one person.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub known_since: Option<NaiveDate>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub occupation: Option<String>,
    pub interests: Vec<String>,
    pub personality: Option<String>,
    pub goals: Vec<String>,
    pub notes_summary: String,
    pub recent_conversations: Vec<ConversationTurn>,
    pub last_update: Option<NaiveDateTime>,
}

impl Profile {
    pub fn new(name: &str, known_since: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            known_since: Some(known_since),
            ..Default::default()
        }
    }

    /// Folds a session summary into the profile.
    ///
    /// The narrative summary is replaced, scalar attributes are only filled
    /// when still unknown, lists gain new entries without duplicates, and
    /// the tail of the session replaces the stored recent turns.
    pub fn merge_summary(
        &mut self,
        summary: &ProfileSummary,
        session: &[ConversationTurn],
        now: NaiveDateTime,
    ) {
        if let Some(text) = summary.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            self.notes_summary = text.trim().to_string();
        }

        fill_if_unknown(&mut self.gender, &summary.gender);
        fill_if_unknown(&mut self.age, &summary.age);
        fill_if_unknown(&mut self.occupation, &summary.occupation);
        fill_if_unknown(&mut self.personality, &summary.personality);

        merge_unique(&mut self.interests, &summary.interests);
        merge_unique(&mut self.goals, &summary.goals);

        let start = session.len().saturating_sub(RECENT_TURNS_KEPT);
        self.recent_conversations = session[start..].to_vec();
        self.last_update = Some(now);
    }
}

fn fill_if_unknown(field: &mut Option<String>, value: &Option<String>) {
    let unknown = field.as_deref().map_or(true, |v| v.trim().is_empty());
    if unknown {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            *field = Some(v.trim().to_string());
        }
    }
}

fn merge_unique(existing: &mut Vec<String>, incoming: &[String]) {
    for item in incoming {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !existing.iter().any(|e| e.eq_ignore_ascii_case(item)) {
            existing.push(item.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn now() -> NaiveDateTime {
        date().and_hms_opt(12, 0, 0).unwrap()
    }

    fn turn(i: usize) -> ConversationTurn {
        ConversationTurn::new(now(), format!("u{i}"), format!("b{i}"))
    }

    #[test]
    fn test_new_profile_is_empty() {
        let p = Profile::new("Anna", date());
        assert_eq!(p.name, "Anna");
        assert_eq!(p.known_since, Some(date()));
        assert!(p.interests.is_empty());
        assert!(p.last_update.is_none());
    }

    #[test]
    fn test_merge_fills_only_unknown_scalars() {
        let mut p = Profile::new("Anna", date());
        p.occupation = Some("insegnante".into());
        let summary = ProfileSummary {
            summary: Some("Abbiamo parlato di montagna.".into()),
            gender: Some("femmina".into()),
            occupation: Some("medico".into()),
            ..Default::default()
        };

        p.merge_summary(&summary, &[], now());

        assert_eq!(p.notes_summary, "Abbiamo parlato di montagna.");
        assert_eq!(p.gender.as_deref(), Some("femmina"));
        assert_eq!(p.occupation.as_deref(), Some("insegnante"));
        assert_eq!(p.last_update, Some(now()));
    }

    #[test]
    fn test_merge_keeps_summary_when_absent() {
        let mut p = Profile::new("Anna", date());
        p.notes_summary = "vecchio".into();
        p.merge_summary(&ProfileSummary::default(), &[], now());
        assert_eq!(p.notes_summary, "vecchio");
    }

    #[test]
    fn test_merge_lists_without_duplicates() {
        let mut p = Profile::new("Anna", date());
        p.interests = vec!["musica".into()];
        let summary = ProfileSummary {
            interests: vec!["Musica".into(), "sci".into(), "sci".into()],
            goals: vec!["imparare il tedesco".into()],
            ..Default::default()
        };

        p.merge_summary(&summary, &[], now());

        assert_eq!(p.interests, vec!["musica", "sci"]);
        assert_eq!(p.goals, vec!["imparare il tedesco"]);
    }

    #[test]
    fn test_merge_keeps_last_five_turns() {
        let mut p = Profile::new("Anna", date());
        let session: Vec<_> = (0..8).map(turn).collect();
        p.merge_summary(&ProfileSummary::default(), &session, now());

        assert_eq!(p.recent_conversations.len(), RECENT_TURNS_KEPT);
        assert_eq!(p.recent_conversations[0].user, "u3");
        assert_eq!(p.recent_conversations[4].user, "u7");
    }

    #[test]
    fn test_deserializes_partial_profile() {
        let p: Profile = serde_json::from_str(r#"{"name": "Bruno", "age": "30-40"}"#).unwrap();
        assert_eq!(p.name, "Bruno");
        assert_eq!(p.age.as_deref(), Some("30-40"));
        assert!(p.goals.is_empty());
    }
}
