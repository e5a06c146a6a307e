//! Conversation turns: an author role plus ordered content parts.

use serde::{Deserialize, Serialize};

/// Who authored a turn.
///
/// Serialized as a plain string: `"user"`, `"model"`, `"system"`, or the name of a
/// specialist agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Author {
    User,
    Model,
    System,
    /// A named specialist agent (e.g. `"StockAgent"`).
    Agent(String),
}

impl Author {
    pub fn as_str(&self) -> &str {
        match self {
            Author::User => "user",
            Author::Model => "model",
            Author::System => "system",
            Author::Agent(name) => name,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Author::User)
    }
}

impl From<String> for Author {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Author::User,
            "model" | "assistant" => Author::Model,
            "system" => Author::System,
            _ => Author::Agent(s),
        }
    }
}

impl From<&str> for Author {
    fn from(s: &str) -> Self {
        Author::from(s.to_string())
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        match author {
            Author::Agent(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Part {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "function_call")]
    FunctionCall {
        name: String,
        args: serde_json::Value,
    },
    #[serde(rename = "function_response")]
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Author,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Author, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Author::User, vec![Part::text(text)])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Author::Model, vec![Part::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Author::System, vec![Part::text(text)])
    }

    pub fn from_agent(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Author::Agent(name.into()), vec![Part::text(text)])
    }

    /// All text parts concatenated without a separator.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// Iterator over the text parts only.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(Part::as_text)
    }
}

/// Text of the most recent user-authored turn, if any.
pub fn latest_user_text(turns: &[Turn]) -> Option<String> {
    turns
        .iter()
        .rev()
        .find(|t| t.role.is_user())
        .map(Turn::text)
}

/// Text of the last turn regardless of author; empty for an empty conversation.
pub fn last_turn_text(turns: &[Turn]) -> String {
    turns.last().map(Turn::text).unwrap_or_default()
}

/// Latest user text, falling back to the last turn's text when no user turn exists.
pub fn latest_user_text_or_last(turns: &[Turn]) -> String {
    latest_user_text(turns).unwrap_or_else(|| last_turn_text(turns))
}

/// Every non-empty text part of every turn, joined by a single space.
pub fn full_text(turns: &[Turn]) -> String {
    turns
        .iter()
        .flat_map(Turn::text_parts)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_round_trips_specialist_names() {
        let json = serde_json::to_string(&Author::Agent("StockAgent".into())).unwrap();
        assert_eq!(json, "\"StockAgent\"");
        let back: Author = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(back, Author::Model);
    }

    #[test]
    fn test_turn_text_skips_non_text_parts() {
        let turn = Turn::new(
            Author::User,
            vec![
                Part::text("Hello, "),
                Part::FunctionCall {
                    name: "noop".into(),
                    args: serde_json::json!({}),
                },
                Part::text("world"),
            ],
        );
        assert_eq!(turn.text(), "Hello, world");
    }

    #[test]
    fn test_latest_user_text_ignores_other_roles() {
        let turns = vec![
            Turn::user("first"),
            Turn::model("reply"),
            Turn::user("second"),
            Turn::from_agent("WeatherAgent", "sunny"),
        ];
        assert_eq!(latest_user_text(&turns).as_deref(), Some("second"));
    }

    #[test]
    fn test_fallback_to_last_turn_without_user() {
        let turns = vec![Turn::system("rules"), Turn::model("hi there")];
        assert_eq!(latest_user_text(&turns), None);
        assert_eq!(latest_user_text_or_last(&turns), "hi there");
        assert_eq!(latest_user_text_or_last(&[]), "");
    }

    #[test]
    fn test_full_text_joins_with_space() {
        let turns = vec![Turn::user("a b"), Turn::model("c")];
        assert_eq!(full_text(&turns), "a b c");
    }

    #[test]
    fn test_full_text_skips_empty_parts() {
        let turns = vec![
            Turn::new(Author::User, vec![Part::text(""), Part::text("a")]),
            Turn::model(""),
            Turn::user("b"),
        ];
        assert_eq!(full_text(&turns), "a b");
    }
}
