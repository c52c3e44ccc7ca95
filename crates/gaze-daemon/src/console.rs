//! Line-oriented control console read from stdin.

use gaze_models::{Command, ConversationStage};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// A control command, by phrase or by name
    Command(Command),
    /// Enter conversation mode, optionally with a partner
    Converse(Option<String>),
    EndConversation,
    Stage(ConversationStage),
    /// Print the full status as JSON
    Status,
    /// Add a face to the simulated scene
    AddFace {
        identity: String,
        confidence: f64,
        x: f64,
        y: f64,
    },
    RemoveFace(String),
    Quit,
}

/// Parse a console line. Returns `None` for blank or unrecognized input.
pub fn parse_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let lowered = line.to_lowercase();
    let mut words = lowered.split_whitespace();
    let head = words.next()?;

    match head {
        "quit" | "exit" => Some(ConsoleInput::Quit),
        "status" => Some(ConsoleInput::Status),
        "converse" => Some(ConsoleInput::Converse(words.next().map(str::to_string))),
        "end" => (words.next() == Some("conversation")).then_some(ConsoleInput::EndConversation),
        "stage" => words
            .next()
            .and_then(|s| s.parse().ok())
            .map(ConsoleInput::Stage),
        "add" => {
            let identity = words.next()?.to_string();
            let confidence = words.next()?.parse().ok()?;
            let x = words.next()?.parse().ok()?;
            let y = words.next()?.parse().ok()?;
            Some(ConsoleInput::AddFace {
                identity,
                confidence,
                x,
                y,
            })
        }
        "remove" => words.next().map(|s| ConsoleInput::RemoveFace(s.to_string())),
        _ => Command::from_phrase(line)
            .or_else(|| line.parse().ok())
            .map(ConsoleInput::Command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrases_and_names() {
        assert_eq!(
            parse_line("Could you look at me?"),
            Some(ConsoleInput::Command(Command::LookAtMe))
        );
        assert_eq!(
            parse_line("look_left"),
            Some(ConsoleInput::Command(Command::LookLeft))
        );
        assert_eq!(parse_line("sing a song"), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_conversation_lines() {
        assert_eq!(
            parse_line("converse Sophia"),
            Some(ConsoleInput::Converse(Some("sophia".to_string())))
        );
        assert_eq!(parse_line("converse"), Some(ConsoleInput::Converse(None)));
        assert_eq!(parse_line("end conversation"), Some(ConsoleInput::EndConversation));
        assert_eq!(
            parse_line("stage thinking"),
            Some(ConsoleInput::Stage(ConversationStage::Processing))
        );
        assert_eq!(parse_line("stage dancing"), None);
    }

    #[test]
    fn test_scene_lines() {
        assert_eq!(
            parse_line("add eladriel 0.8 200 240"),
            Some(ConsoleInput::AddFace {
                identity: "eladriel".to_string(),
                confidence: 0.8,
                x: 200.0,
                y: 240.0,
            })
        );
        assert_eq!(parse_line("add eladriel"), None);
        assert_eq!(
            parse_line("remove eladriel"),
            Some(ConsoleInput::RemoveFace("eladriel".to_string()))
        );
    }

    #[test]
    fn test_quit() {
        assert_eq!(parse_line("EXIT"), Some(ConsoleInput::Quit));
    }
}
