//! Control commands accepted by the tracking engine.
//!
//! Free-text phrases (voice transcripts, console input) are mapped to a
//! [`Command`] once, at the API boundary. Everything past that point works
//! with the tagged variant.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A manual control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Start tracking faces.
    LookAtMe,
    /// Stop tracking and return to the rest pose.
    StopTracking,
    /// Report who is currently being tracked.
    WhoAreYouTracking,
    /// Start a search sweep on the next tick.
    SearchForFaces,
    LookLeft,
    LookRight,
    LookUp,
    LookDown,
    /// Return to the rest pose without stopping.
    Center,
}

/// Phrase table, checked in order. Stop phrases come first so that
/// "stop looking at me" never starts tracking.
const PHRASES: &[(&str, Command)] = &[
    ("stop looking", Command::StopTracking),
    ("stop tracking", Command::StopTracking),
    ("stop following", Command::StopTracking),
    ("who are you looking at", Command::WhoAreYouTracking),
    ("who are you tracking", Command::WhoAreYouTracking),
    ("tracking status", Command::WhoAreYouTracking),
    ("search for faces", Command::SearchForFaces),
    ("find faces", Command::SearchForFaces),
    ("look for people", Command::SearchForFaces),
    ("look at me", Command::LookAtMe),
    ("track my face", Command::LookAtMe),
    ("follow me", Command::LookAtMe),
    ("look left", Command::LookLeft),
    ("look right", Command::LookRight),
    ("look up", Command::LookUp),
    ("look down", Command::LookDown),
    ("center your eyes", Command::Center),
    ("look at center", Command::Center),
    ("look forward", Command::Center),
];

impl Command {
    pub const ALL: &'static [Command] = &[
        Command::LookAtMe,
        Command::StopTracking,
        Command::WhoAreYouTracking,
        Command::SearchForFaces,
        Command::LookLeft,
        Command::LookRight,
        Command::LookUp,
        Command::LookDown,
        Command::Center,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::LookAtMe => "look_at_me",
            Command::StopTracking => "stop_tracking",
            Command::WhoAreYouTracking => "who_are_you_tracking",
            Command::SearchForFaces => "search_for_faces",
            Command::LookLeft => "look_left",
            Command::LookRight => "look_right",
            Command::LookUp => "look_up",
            Command::LookDown => "look_down",
            Command::Center => "center",
        }
    }

    /// Map a free-text phrase to a command, if it contains a known phrase.
    pub fn from_phrase(text: &str) -> Option<Command> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        PHRASES
            .iter()
            .find(|(phrase, _)| lowered.contains(phrase))
            .map(|(_, command)| *command)
    }

    /// Whether this command moves the gimbal directly.
    pub fn is_manual_motion(&self) -> bool {
        matches!(
            self,
            Command::LookLeft
                | Command::LookRight
                | Command::LookUp
                | Command::LookDown
                | Command::Center
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Command::ALL
            .iter()
            .find(|command| command.as_str() == normalized)
            .copied()
            .ok_or_else(|| CommandParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown command: {0}")]
pub struct CommandParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_matching_is_case_insensitive() {
        assert_eq!(Command::from_phrase("Hey, LOOK AT ME please"), Some(Command::LookAtMe));
        assert_eq!(Command::from_phrase("could you look left?"), Some(Command::LookLeft));
        assert_eq!(Command::from_phrase("center your eyes"), Some(Command::Center));
    }

    #[test]
    fn test_stop_phrases_win_over_start_phrases() {
        assert_eq!(
            Command::from_phrase("stop looking at me"),
            Some(Command::StopTracking)
        );
        assert_eq!(
            Command::from_phrase("who are you looking at"),
            Some(Command::WhoAreYouTracking)
        );
    }

    #[test]
    fn test_unknown_phrase() {
        assert_eq!(Command::from_phrase("tell me a story"), None);
        assert_eq!(Command::from_phrase("   "), None);
    }

    #[test]
    fn test_from_str_accepts_names() {
        assert_eq!("look-up".parse::<Command>().unwrap(), Command::LookUp);
        assert_eq!("Who Are You Tracking".parse::<Command>().unwrap(), Command::WhoAreYouTracking);
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn test_manual_motion_classification() {
        assert!(Command::LookDown.is_manual_motion());
        assert!(Command::Center.is_manual_motion());
        assert!(!Command::SearchForFaces.is_manual_motion());
    }
}
