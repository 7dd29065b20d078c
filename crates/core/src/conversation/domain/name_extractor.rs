use regex::Regex;

/// Words kept from the utterance at most.
const MAX_NAME_WORDS: usize = 2;

/// Pulls a person's name out of an answer like "ehm, mi chiamo marco rossi".
pub struct NameExtractor {
    scaffolding: Regex,
    non_letters: Regex,
}

impl NameExtractor {
    pub fn new() -> Self {
        let scaffolding = Regex::new(
            r"(?i)\b(mi chiamo|il mio nome (è|e)|puoi chiamarmi|chiamami|io sono|sono|ciao|salve|piacere|allora|dunque|beh|ehm+|uhm+|mah|ok|okay|sì|si|certo)\b",
        )
        .expect("name scaffolding pattern is valid");
        let non_letters = Regex::new(r"[^\p{L}'\s]").expect("letter filter pattern is valid");
        Self {
            scaffolding,
            non_letters,
        }
    }

    /// Returns the capitalized name, or `None` when nothing but filler was
    /// said.
    pub fn extract(&self, transcript: &str) -> Option<String> {
        let lowered = transcript.to_lowercase();
        let letters_only = self.non_letters.replace_all(&lowered, " ");
        let stripped = self.scaffolding.replace_all(&letters_only, " ");

        let words: Vec<String> = stripped
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphabetic))
            .take(MAX_NAME_WORDS)
            .map(capitalize)
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
