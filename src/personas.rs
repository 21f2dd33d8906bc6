//! Persona types for AIBud
//!
//! A persona is a named system-prompt template that controls the assistant's
//! tone and behavior. Personas form a closed enumeration; each variant carries
//! fixed instruction text that is prepended to every prompt.

use colored::Colorize;
use std::fmt;

/// Named system-prompt persona for the assistant
///
/// Determines the instruction text sent ahead of the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persona {
    /// Clear, concise, and accurate answers
    #[default]
    Professional,

    /// Conversational tone, emoji-friendly
    Casual,

    /// Guides with probing questions instead of direct answers
    Coaching,

    /// Enthusiastic, with encouragement and positive feedback
    Friendly,
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Casual => write!(f, "casual"),
            Self::Coaching => write!(f, "coaching"),
            Self::Friendly => write!(f, "friendly"),
        }
    }
}

impl Persona {
    /// Parse a persona from a string
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the persona
    ///
    /// # Returns
    ///
    /// Returns the parsed Persona or an error if the string is invalid
    ///
    /// # Examples
    ///
    /// ```
    /// use aibud::personas::Persona;
    ///
    /// let persona = Persona::parse_str("casual").unwrap();
    /// assert_eq!(persona, Persona::Casual);
    /// ```
    pub fn parse_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "casual" => Ok(Self::Casual),
            "coaching" => Ok(Self::Coaching),
            "friendly" => Ok(Self::Friendly),
            other => Err(format!("Unknown persona: {}", other)),
        }
    }

    /// All personas, in display order
    pub fn all() -> &'static [Persona] {
        &[
            Self::Professional,
            Self::Casual,
            Self::Coaching,
            Self::Friendly,
        ]
    }

    /// Get the system-prompt instruction text for this persona
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Professional => {
                "You are a helpful and professional AI assistant. Please provide clear, \
                 concise, and accurate information."
            }
            Self::Casual => {
                "You're a friendly and casual AI buddy. You're here to help with anything \
                 you need. Feel free to use emojis and a conversational tone."
            }
            Self::Coaching => {
                "You are a supportive AI coach. Your goal is to guide users, ask probing \
                 questions, and help them discover solutions on their own, rather than \
                 just giving away the answer. Encourage learning and personal growth."
            }
            Self::Friendly => {
                "You are an enthusiastic and friendly AI assistant. You are excited to \
                 help with any questions and provide encouragement and positive feedback."
            }
        }
    }

    /// Get a short user-facing description of this persona
    pub fn description(&self) -> &'static str {
        match self {
            Self::Professional => "Clear, concise, and accurate answers",
            Self::Casual => "Conversational tone, emoji-friendly",
            Self::Coaching => "Guides with questions instead of answers",
            Self::Friendly => "Enthusiastic and encouraging",
        }
    }

    /// Get a colored tag representation of this persona
    ///
    /// # Returns
    ///
    /// A colored string suitable for display in terminal output
    pub fn colored_tag(&self) -> String {
        match self {
            Self::Professional => format!("[{}]", "professional".blue()),
            Self::Casual => format!("[{}]", "casual".yellow()),
            Self::Coaching => format!("[{}]", "coaching".purple()),
            Self::Friendly => format!("[{}]", "friendly".green()),
        }
    }
}
