//! Greeting and farewell recognition.
//!
//! Runs before semantic matching. Matching is plain substring containment on
//! the trimmed, lower-cased message, so a phrase anywhere in the text counts.

use serde::{Deserialize, Serialize};

/// Conversational intents answered with a canned response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
}

const GREETINGS: &[&str] = &[
    // en
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    // hi
    "नमस्ते",
    "नमस्कार",
    "हैलो",
    "हाय",
    // ta
    "வணக்கம்",
    "ஹலோ",
    // te
    "నమస్కారం",
    "హలో",
    // kn
    "ನಮಸ್ಕಾರ",
    "ಹಲೋ",
    // mr
    "हॅलो",
    // gu
    "નમસ્તે",
    "હેલો",
    // bn
    "নমস্কার",
    "হ্যালো",
];

const FAREWELLS: &[&str] = &[
    // en
    "bye",
    "goodbye",
    "see you",
    "thanks",
    "thank you",
    "that's all",
    // hi
    "अलविदा",
    "धन्यवाद",
    "बाय",
    "गुडबाय",
    // ta
    "பாய்",
    "நன்றி",
    // te
    "బై",
    "ధన్యవాదాలు",
    // kn
    "ಬೈ",
    "ಧನ್ಯವಾದಗಳು",
    // gu
    "બાય",
    "આભાર",
    // bn
    "বাই",
    "ধন্যবাদ",
];

/// Recognizes greetings and farewells in every supported language.
#[derive(Debug, Clone)]
pub struct IntentShortCircuit {
    greetings: Vec<String>,
    farewells: Vec<String>,
}

impl Default for IntentShortCircuit {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentShortCircuit {
    /// Built-in phrase sets.
    pub fn new() -> Self {
        Self::with_phrases(GREETINGS, FAREWELLS)
    }

    /// Custom phrase sets. Phrases are lower-cased once here.
    pub fn with_phrases(greetings: &[&str], farewells: &[&str]) -> Self {
        let normalize = |phrases: &[&str]| -> Vec<String> {
            phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            greetings: normalize(greetings),
            farewells: normalize(farewells),
        }
    }

    /// Classify `message`. Greeting wins when both sets match.
    pub fn check(&self, message: &str) -> Option<Intent> {
        let text = message.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        if self.greetings.iter().any(|p| text.contains(p.as_str())) {
            return Some(Intent::Greeting);
        }
        if self.farewells.iter().any(|p| text.contains(p.as_str())) {
            return Some(Intent::Farewell);
        }
        None
    }

    pub fn is_greeting(&self, message: &str) -> bool {
        self.check(message) == Some(Intent::Greeting)
    }

    pub fn is_farewell(&self, message: &str) -> bool {
        self.check(message) == Some(Intent::Farewell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings_in_each_language() {
        let intents = IntentShortCircuit::new();
        for message in [
            "Hello",
            "  GOOD MORNING  ",
            "नमस्ते",
            "வணக்கம்",
            "నమస్కారం",
            "ನಮಸ್ಕಾರ",
            "हॅलो",
            "નમસ્તે",
            "নমস্কার",
        ] {
            assert_eq!(intents.check(message), Some(Intent::Greeting), "{}", message);
        }
    }

    #[test]
    fn test_farewells_in_each_language() {
        let intents = IntentShortCircuit::new();
        for message in [
            "Thank you, bye",
            "That's all",
            "धन्यवाद",
            "நன்றி",
            "ధన్యవాదాలు",
            "ಧನ್ಯವಾದಗಳು",
            "આભાર",
            "ধন্যবাদ",
        ] {
            assert_eq!(intents.check(message), Some(Intent::Farewell), "{}", message);
        }
    }

    #[test]
    fn test_plain_question_is_not_an_intent() {
        let intents = IntentShortCircuit::new();
        assert_eq!(intents.check("Where is the library?"), None);
        assert_eq!(intents.check("What are the admission requirements?"), None);
        assert_eq!(intents.check("   "), None);
    }

    #[test]
    fn test_greeting_wins_over_farewell() {
        let intents = IntentShortCircuit::new();
        assert_eq!(intents.check("Hello and goodbye"), Some(Intent::Greeting));
    }

    #[test]
    fn test_substring_containment_not_word_match() {
        let intents = IntentShortCircuit::new();
        // "hi" is contained in "this"
        assert!(intents.is_greeting("Is this open on Sunday?"));
        // "bye" inside "byelaws"
        assert!(intents.is_farewell("Where are the college byelaws?"));
    }

    #[test]
    fn test_custom_phrases() {
        let intents = IntentShortCircuit::with_phrases(&["Howdy"], &["Later"]);
        assert!(intents.is_greeting("howdy folks"));
        assert!(intents.is_farewell("see you LATER"));
        assert_eq!(intents.check("hello"), None);
    }
}
