use anyhow::Result;
use futures::StreamExt;
use tracing::{error, info};
use wayfarer::agent::Agent;

use crate::prompt::{InputType, Prompt};

pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<impl Prompt + 'a>) -> Self {
        Session { agent, prompt }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Read questions until the user exits. A failed turn is reported and the
    /// session carries on with the next question.
    pub async fn start(&mut self) -> Result<()> {
        self.prompt.greet();

        loop {
            let input = self.prompt.get_input()?;
            let question = match input.input_type {
                InputType::Message => match input.content {
                    Some(content) => content,
                    None => continue,
                },
                InputType::Exit => break,
                InputType::AskAgain => continue,
                InputType::Help => {
                    self.prompt.show_help();
                    continue;
                }
            };

            self.process_question(&question).await;
        }

        info!(messages = self.agent.history().len(), "session closed");
        self.prompt.close();
        Ok(())
    }

    /// Run one turn, rendering each step as it arrives
    pub async fn process_question(&mut self, question: &str) {
        self.prompt.show_busy();

        let mut stream = self.agent.reply(question);
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => self.prompt.render(&event),
                Err(e) => {
                    error!(error = %e, "turn failed");
                    self.prompt.render_error(&e.to_string());
                    break;
                }
            }
        }

        self.prompt.hide_busy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{parse_input, Input};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use wayfarer::agent::ReplyEvent;
    use wayfarer::models::message::Message;
    use wayfarer::providers::base::ModelEvent;
    use wayfarer::providers::mock::MockProvider;

    /// Feeds scripted lines and records what would have been printed
    struct ScriptedPrompt {
        lines: VecDeque<String>,
        output: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedPrompt {
        fn new(lines: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>) {
            let output = Arc::new(Mutex::new(Vec::new()));
            let prompt = Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                output: output.clone(),
            };
            (prompt, output)
        }
    }

    impl Prompt for ScriptedPrompt {
        fn render(&mut self, event: &ReplyEvent) {
            let line = match event {
                ReplyEvent::Text(fragment) => format!("text:{}", fragment),
                ReplyEvent::ToolRequest(request) => format!("tool:{}", request.tool_name()),
                ReplyEvent::ToolResponse(response) => format!("result:{}", response.id),
                ReplyEvent::Done(message) => format!("done:{}", message.text()),
            };
            self.output.lock().unwrap().push(line);
        }

        fn render_error(&mut self, message: &str) {
            self.output.lock().unwrap().push(format!("error:{}", message));
        }

        fn get_input(&mut self) -> Result<Input> {
            Ok(match self.lines.pop_front() {
                Some(line) => parse_input(&line),
                None => parse_input("exit"),
            })
        }

        fn show_busy(&mut self) {}
        fn hide_busy(&mut self) {}
        fn close(&self) {}
        fn greet(&self) {}
        fn show_help(&self) {
            self.output.lock().unwrap().push("help".to_string());
        }
    }

    #[tokio::test]
    async fn test_exit_makes_no_model_calls() -> Result<()> {
        let provider = MockProvider::with_replies(vec![Message::assistant().with_text("unused")]);
        let (prompt, output) = ScriptedPrompt::new(&["  Exit  ", "are you still there?"]);

        let mut session = Session::new(Agent::new(Box::new(provider.clone())), Box::new(prompt));
        session.start().await?;

        assert_eq!(provider.call_count(), 0);
        assert!(session.agent().history().is_empty());
        assert!(output.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_question_then_exit() -> Result<()> {
        let provider = MockProvider::new(vec![vec![
            ModelEvent::TextFragment("Try ".to_string()),
            ModelEvent::TextFragment("Sushi Dai.".to_string()),
            ModelEvent::StreamEnd { usage: None },
        ]]);
        let (prompt, output) = ScriptedPrompt::new(&["", "/help", "sushi near Tsukiji?", "exit"]);

        let mut session = Session::new(Agent::new(Box::new(provider.clone())), Box::new(prompt));
        session.start().await?;

        assert_eq!(provider.call_count(), 1);
        let history = session.agent().history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].text(), "sushi near Tsukiji?");
        assert_eq!(history.messages()[1].text(), "Try Sushi Dai.");
        assert_eq!(
            *output.lock().unwrap(),
            vec!["help", "text:Try ", "text:Sushi Dai.", "done:Try Sushi Dai."]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_session_alive() -> Result<()> {
        let provider = MockProvider::with_replies(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(wayfarer::models::tool::ToolCall::new("x__y", serde_json::json!({}))),
            ),
            Message::assistant().with_text("Sorry."),
            Message::assistant().with_text("Hello again."),
        ]);
        let agent = Agent::new(Box::new(provider.clone())).with_max_steps(1);
        let (prompt, output) = ScriptedPrompt::new(&["first", "second"]);

        let mut session = Session::new(agent, Box::new(prompt));
        session.start().await?;

        let output = output.lock().unwrap();
        assert!(output.iter().any(|line| line.starts_with("error:")));
        assert_eq!(output.last().map(String::as_str), Some("done:Sorry."));
        assert_eq!(provider.call_count(), 2);
        Ok(())
    }
}
