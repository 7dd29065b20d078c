//! Post-processing of raw model replies before they are spoken.
use std::sync::OnceLock;

use regex::Regex;

use super::conversation_state::ConversationState;

/// Sentences kept in a farewell.
const FAREWELL_SENTENCES: usize = 2;

struct Patterns {
    whitespace: Regex,
    greeting_with_name: Regex,
    greeting: Regex,
    boilerplate: Vec<Regex>,
    sentence: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("reply pattern is valid");
        Patterns {
            whitespace: compile(r"\s+"),
            greeting_with_name: compile(r"(?i)^ciao\s+\p{L}+[,!.]\s*"),
            greeting: compile(r"(?i)^ciao\b[,!.]?\s*"),
            boilerplate: [
                r"(?i)sto sempre felice di vederti[^.]*\.",
                r"(?i)sto sempre qui per aiutarti[^.]*\.",
                r"(?i)sono felice di poterti supportare[^.]*\.",
                r"(?i)non ti preoccupare[^.]*\.",
                r"(?i)qualunque cosa tu abbia bisogno[^.]*\.",
            ]
            .into_iter()
            .map(compile)
            .collect(),
            sentence: compile(r"[^.?!]*[.?!]+|[^.?!]+$"),
        }
    })
}

/// Tidies a model reply for speech.
///
/// Repeated greetings are dropped once the conversation is under way, stock
/// filler sentences are removed, and a farewell is cut to its first two
/// statements.
pub fn clean_reply(raw: &str, state: ConversationState, is_first_turn: bool) -> String {
    let p = patterns();
    let mut text = p.whitespace.replace_all(raw.trim(), " ").into_owned();

    if !is_first_turn && state != ConversationState::Greeting {
        text = if p.greeting_with_name.is_match(&text) {
            p.greeting_with_name.replace(&text, "").into_owned()
        } else {
            p.greeting.replace(&text, "").into_owned()
        };
    }

    for pattern in &p.boilerplate {
        text = pattern.replace_all(&text, "").into_owned();
    }

    if state == ConversationState::Farewell {
        text = p
            .sentence
            .find_iter(&text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty() && !s.contains('?'))
            .take(FAREWELL_SENTENCES)
            .collect::<Vec<_>>()
            .join(" ");
    }

    p.whitespace.replace_all(text.trim(), " ").into_owned()
}
