use std::io::{self, Write};

use anyhow::Result;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use wayfarer::agent::ReplyEvent;
use wayfarer::models::message::{ToolRequest, ToolResponse};

use super::{parse_input, Input, InputType, Prompt};

const PROMPT: &str = "(User): ";
const MAX_STRING_LENGTH: usize = 40;
const INDENT: &str = "    ";

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: Option<cliclack::ProgressBar>,
    // Whether the "(Assistant):" prefix for the current answer is already printed
    answering: bool,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: None,
            answering: false,
        })
    }

    fn start_answer(&mut self) {
        if !self.answering {
            self.hide_busy();
            print!("{} ", style("(Assistant):").bold());
            self.answering = true;
        }
    }

    fn end_answer(&mut self) {
        if self.answering {
            println!();
            self.answering = false;
        }
    }
}

fn print_tool_request(tool_request: &ToolRequest) {
    match &tool_request.tool_call {
        Ok(call) => {
            let (toolkit, tool) = call
                .name
                .split_once("__")
                .unwrap_or(("unknown", call.name.as_str()));
            println!("{}", style(format!("─── {} | {} ───", tool, toolkit)).dim());
            print_params(&call.arguments, 1);
        }
        Err(e) => println!("{}", style(format!("─── unusable tool call: {}", e)).dim()),
    }
}

fn print_tool_response(tool_response: &ToolResponse) {
    if let Err(e) = &tool_response.tool_result {
        println!("{}{}", INDENT, style(e).red().dim());
    }
}

/// Format and print parameters with proper indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    if let Value::Object(map) = value {
        for (key, val) in map {
            match val {
                Value::String(s) if s.len() > MAX_STRING_LENGTH => {
                    println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                }
                Value::String(s) => {
                    println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                }
                Value::Number(n) => {
                    println!("{}{}: {}", indent, style(key).dim(), style(n).blue());
                }
                other => {
                    println!("{}{}: {}", indent, style(key).dim(), style(other).dim());
                }
            }
        }
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, event: &ReplyEvent) {
        match event {
            ReplyEvent::Text(fragment) => {
                self.start_answer();
                print!("{}", fragment);
            }
            ReplyEvent::ToolRequest(tool_request) => {
                self.end_answer();
                self.hide_busy();
                print_tool_request(tool_request);
            }
            ReplyEvent::ToolResponse(tool_response) => {
                print_tool_response(tool_response);
                self.show_busy();
            }
            ReplyEvent::Done(_) => {
                // An answer with no text still gets its prefix line
                self.start_answer();
                self.end_answer();
                println!();
            }
        }
        let _ = io::stdout().flush();
    }

    fn render_error(&mut self, message: &str) {
        self.hide_busy();
        self.end_answer();
        println!("{}", style(format!("Error: {}", message)).red());
        println!();
    }

    fn get_input(&mut self) -> Result<Input> {
        match self.editor.readline(PROMPT) {
            Ok(line) => {
                let input = parse_input(&line);
                if input.input_type == InputType::Message {
                    let _ = self.editor.add_history_entry(line.trim());
                }
                Ok(input)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(Input {
                input_type: InputType::Exit,
                content: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn show_busy(&mut self) {
        self.hide_busy();
        let spinner = spinner();
        spinner.start("thinking...");
        self.spinner = Some(spinner);
    }

    fn hide_busy(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop("");
        }
    }

    fn close(&self) {
        println!("{}", style("Goodbye!").dim());
    }
}
