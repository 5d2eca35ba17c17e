//! Pre-filter that keeps clearly off-topic requests away from the completion
//! capability. Deliberately permissive: only explicit deny-list phrases block,
//! everything ambiguous passes through.

const BASIC_GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
    "ok",
    "okay",
    "yes",
    "no",
];

const BLOCKED_PHRASES: &[&str] = &[
    "write a function",
    "create a script",
    "python code",
    "javascript code",
    "programming",
    "machine learning",
    "ai model",
    "deep learning",
    "recipe",
    "cooking",
    "weather",
    "news",
    "movie",
    "book",
    "travel",
    "health advice",
    "medical advice",
    "legal advice",
    "personal advice",
    "relationship",
    "entertainment",
    "game",
    "sport",
    "politics",
    "write me a",
    "create me a",
    "build me a",
    "develop a",
];

pub const OFF_TOPIC_SUGGESTION: &str = "I'm specifically designed for Worker Operations \
Business Intelligence. Please ask me about agent performance, productivity metrics, \
scheduling adherence, or other operational data analysis questions.";

#[derive(Debug, PartialEq)]
pub enum Relevance {
    Allowed,
    Blocked { suggestion: &'static str },
}

pub fn check(user_text: &str) -> Relevance {
    let message = user_text.trim().to_lowercase();

    // Conversational chatter always passes
    if BASIC_GREETINGS.iter().any(|g| message.contains(g)) {
        return Relevance::Allowed;
    }

    // Short inputs are likely conversational
    if message.split_whitespace().count() <= 3 {
        return Relevance::Allowed;
    }

    if BLOCKED_PHRASES.iter().any(|p| message.contains(p)) {
        return Relevance::Blocked {
            suggestion: OFF_TOPIC_SUGGESTION,
        };
    }

    // Permissive by default: unmatched text is allowed through
    Relevance::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_pass() {
        assert_eq!(check("Hello there, how are you doing today my friend"), Relevance::Allowed);
        assert_eq!(check("thanks"), Relevance::Allowed);
    }

    #[test]
    fn short_inputs_pass() {
        assert_eq!(check("adherence last week"), Relevance::Allowed);
    }

    #[test]
    fn deny_list_phrases_block() {
        assert!(matches!(
            check("please write me a poem about the mountains in spring"),
            Relevance::Blocked { .. }
        ));
        assert!(matches!(
            check("what is the weather forecast for the city tomorrow"),
            Relevance::Blocked { .. }
        ));
    }

    #[test]
    fn analytical_questions_pass() {
        assert_eq!(
            check("show me average handle time by supervisor for the last four weeks"),
            Relevance::Allowed
        );
    }

    #[test]
    fn ambiguous_text_passes_by_default() {
        assert_eq!(
            check("tell me something interesting about the organisation please"),
            Relevance::Allowed
        );
    }
}
