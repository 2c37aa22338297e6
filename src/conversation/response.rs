//! Interpretation of generated text: control tokens, skill triggers, or
//! speech.

pub const LISTENING_TOKEN: &str = "[LISTENING]";
pub const EXIT_TOKEN: &str = "[EXIT]";

/// What to do with one completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    /// Blank response.
    Ignore,
    /// The model is waiting for more input.
    Listening,
    /// End the conversation.
    Exit,
    /// Hand `input` to the skill at `index` of the registered list.
    Skill { index: usize, input: String },
    /// Append as an assistant turn and speak it.
    Speak(String),
}

impl ResponseAction {
    /// Classify `text`.  `triggers` are checked in order; the first whose
    /// trigger prefixes the text wins.
    pub fn parse<S: AsRef<str>>(text: &str, triggers: &[S]) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return ResponseAction::Ignore;
        }
        if starts_with_ignore_case(text, LISTENING_TOKEN) {
            return ResponseAction::Listening;
        }
        if starts_with_ignore_case(text, EXIT_TOKEN) {
            return ResponseAction::Exit;
        }

        let cleaned = remove_ignore_case(text, LISTENING_TOKEN);
        let cleaned = cleaned.trim();

        for (index, trigger) in triggers.iter().enumerate() {
            let trigger = trigger.as_ref();
            if starts_with_ignore_case(cleaned, trigger) {
                let input = cleaned[trigger.len()..].trim().to_string();
                return ResponseAction::Skill { index, input };
            }
        }

        if cleaned.is_empty() {
            ResponseAction::Ignore
        } else {
            ResponseAction::Speak(cleaned.to_string())
        }
    }
}

/// ASCII case-insensitive prefix test.
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Remove every ASCII case-insensitive occurrence of `needle`.
fn remove_ignore_case(text: &str, needle: &str) -> String {
    if needle.is_empty() {
        return text.to_string();
    }
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let at = from + found;
        out.push_str(&text[from..at]);
        from = at + needle.len();
    }
    out.push_str(&text[from..]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
