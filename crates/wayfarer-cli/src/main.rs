use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use wayfarer::agent::Agent;
use wayfarer::providers::openai::OpenAiProvider;
use wayfarer::toolkits::local_guide::LocalGuideToolkit;

mod configuration;
mod error;
mod logging;
mod prompt;
mod session;

use configuration::Settings;
use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about = "Ask a local guide for places to eat, drink and visit", long_about = None)]
struct Cli {
    /// Chat model to use (overrides the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum number of model calls per question
    #[arg(long)]
    max_steps: Option<usize>,

    /// Path to a TOML config file (defaults to ~/.config/wayfarer/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging() {
        eprintln!("{}", style(format!("Logging disabled: {}", e)).dim());
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        settings.provider.model = model;
    }
    if let Some(max_steps) = cli.max_steps {
        settings.agent.max_steps = max_steps;
    }

    let provider = OpenAiProvider::new(settings.provider_config()?)?;
    let toolkit = LocalGuideToolkit::new(settings.local_guide_config()?)?;

    let mut agent = Agent::new(Box::new(provider)).with_max_steps(settings.agent.max_steps);
    agent.add_toolkit(Box::new(toolkit));

    let mut session = Session::new(agent, Box::new(RustylinePrompt::new()?));
    session.start().await
}
