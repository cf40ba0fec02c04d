use anyhow::Result;
use console::style;
use wayfarer::agent::ReplyEvent;

pub mod rustyline;

pub trait Prompt {
    /// Show one step of the assistant's reply as it happens
    fn render(&mut self, event: &ReplyEvent);
    fn render_error(&mut self, message: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);

    fn greet(&self) {
        println!(
            "{} {}",
            style("Wayfarer, your local guide.").bold(),
            style("Ask about places to eat, drink or visit. Type \"exit\" to end the session.").dim()
        );
        println!();
    }

    fn show_help(&self) {
        println!("Commands:");
        println!("exit | /exit - End the session");
        println!("/? | /help - Display this help message");
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Help,     // Show the available commands, then ask again
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

impl Input {
    fn command(input_type: InputType) -> Self {
        Self {
            input_type,
            content: None,
        }
    }
}

/// Classify a line typed at the prompt
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();

    if text.is_empty() {
        Input::command(InputType::AskAgain)
    } else if ["exit", "/exit", "/quit"]
        .iter()
        .any(|cmd| text.eq_ignore_ascii_case(cmd))
    {
        Input::command(InputType::Exit)
    } else if text.eq_ignore_ascii_case("/?") || text.eq_ignore_ascii_case("/help") {
        Input::command(InputType::Help)
    } else {
        Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit() {
        for line in ["exit", "  EXIT ", "Exit\n", "/quit"] {
            assert_eq!(parse_input(line).input_type, InputType::Exit, "{:?}", line);
        }
    }

    #[test]
    fn test_parse_empty_asks_again() {
        assert_eq!(parse_input("   ").input_type, InputType::AskAgain);
    }

    #[test]
    fn test_parse_help() {
        assert_eq!(parse_input("/help").input_type, InputType::Help);
    }

    #[test]
    fn test_parse_message() {
        let input = parse_input("  sushi near Ginza? ");
        assert_eq!(input.input_type, InputType::Message);
        assert_eq!(input.content.as_deref(), Some("sushi near Ginza?"));

        // Only the bare word ends the session
        assert_eq!(parse_input("exit the station").input_type, InputType::Message);
    }
}
