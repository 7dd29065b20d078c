/// What an utterance means for the flow of the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Continue,
    Close,
    /// A lone greeting word with no further content.
    LightGreeting,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Intent;
}

const GREETING_WORDS: &[&str] = &[
    "ciao", "salve", "buongiorno", "buonasera", "hey", "ehi", "hei", "hello", "hi",
];

const CONTINUATION_CUES: &[&str] = &["come stai", "e tu", "e lei", "tutto bene", "raccontami"];

const CLOSING_PHRASES: &[&str] = &[
    "ciao ciao",
    "arrivederci",
    "a presto",
    "alla prossima",
    "ci vediamo",
    "devo andare",
    "me ne vado",
    "buonanotte",
    "addio",
    "esci",
    "stop",
    "basta",
];

/// Keyword heuristics for Italian small talk.
#[derive(Clone, Debug, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Lowercases and replaces punctuation with spaces, collapsing runs.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let padded = format!(" {normalized} ");
    padded.contains(&format!(" {phrase} "))
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, text: &str) -> Intent {
        let normalized = normalize(text);
        if GREETING_WORDS.contains(&normalized.as_str()) {
            return Intent::LightGreeting;
        }
        if text.contains('?')
            || CONTINUATION_CUES
                .iter()
                .any(|cue| contains_phrase(&normalized, cue))
        {
            return Intent::Continue;
        }
        if CLOSING_PHRASES
            .iter()
            .any(|phrase| contains_phrase(&normalized, phrase))
        {
            return Intent::Close;
        }
        Intent::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ciao", Intent::LightGreeting)]
    #[case("Ciao!", Intent::LightGreeting)]
    #[case("  Buongiorno.  ", Intent::LightGreeting)]
    #[case("ehi", Intent::LightGreeting)]
    #[case("ciao, come stai?", Intent::Continue)]
    #[case("sto bene, tu?", Intent::Continue)]
    #[case("oggi ho lavorato tanto", Intent::Continue)]
    #[case("e tu cosa fai di bello", Intent::Continue)]
    #[case("arrivederci", Intent::Close)]
    #[case("Ok, ciao ciao!", Intent::Close)]
    #[case("adesso devo andare", Intent::Close)]
    #[case("basta così", Intent::Close)]
    #[case("a presto allora", Intent::Close)]
    fn test_classify(#[case] text: &str, #[case] expected: Intent) {
        assert_eq!(KeywordIntentClassifier::new().classify(text), expected);
    }

    #[test]
    fn test_question_overrides_closing_phrase() {
        let classifier = KeywordIntentClassifier::new();
        assert_eq!(classifier.classify("ci vediamo domani?"), Intent::Continue);
    }

    #[test]
    fn test_closing_phrase_must_be_whole_words() {
        let classifier = KeywordIntentClassifier::new();
        assert_eq!(classifier.classify("stoppare il video"), Intent::Continue);
        assert_eq!(classifier.classify("bastava poco"), Intent::Continue);
    }

    #[test]
    fn test_empty_text_is_continue() {
        assert_eq!(KeywordIntentClassifier::new().classify(""), Intent::Continue);
    }

    #[test]
    fn test_normalize_collapses_punctuation() {
        assert_eq!(normalize("Ciao,   Marco!!"), "ciao marco");
    }
}
