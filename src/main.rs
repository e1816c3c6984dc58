use anyhow::{bail, Context, Result};
use aura::assistant::AssistantWidget;
use aura::catalog::Catalog;
use aura::chat_api::{ChatClient, ChatConfig};
use aura::conversation::{ReplyGateway, SendOutcome, Settled};
use aura::gui::run_gui;
use aura::message_store::Role;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the OpenAI-compatible chat API
    #[arg(long, env = "AURA_HOST", default_value = "http://localhost:11434")]
    host: String,

    /// Model used by the concierge
    #[arg(long, env = "AURA_MODEL", default_value = "qwen2.5:7b")]
    model: String,

    /// Bearer token for the chat API
    #[arg(long, env = "AURA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the concierge system prompt
    #[arg(long, env = "AURA_SYSTEM")]
    system: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.4)]
    temperature: f32,

    /// Max tokens per reply
    #[arg(long, default_value_t = 512)]
    max_tokens: u32,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_seconds: u64,

    /// Product catalog JSON (defaults to ./catalog.json, then the built-in collection)
    #[arg(long, env = "AURA_CATALOG")]
    catalog: Option<PathBuf>,

    /// Chat in the terminal instead of opening the storefront window
    #[arg(long, default_value_t = false)]
    cli: bool,

    /// Single question (implies --cli)
    prompt: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::try_load_default().unwrap_or_default(),
    };

    let system = args
        .system
        .unwrap_or_else(|| ChatConfig::default().system);
    let config = ChatConfig {
        host: args.host,
        model: args.model,
        api_key: args.api_key,
        system: format!("{system}\n\n{}", catalog.prompt_summary()),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        timeout_seconds: args.timeout_seconds,
    };

    if args.cli || args.prompt.is_some() {
        run_cli(config, args.prompt.as_deref())
    } else {
        run_gui(config, catalog)
    }
}

fn run_cli(config: ChatConfig, prompt: Option<&str>) -> Result<()> {
    // The worker gives up on its own once the HTTP timeout fires.
    let wait = Duration::from_secs(config.timeout_seconds + 5);
    let client = ChatClient::new(config)?;
    let mut assistant = AssistantWidget::new(Arc::new(client));

    if let Some(prompt) = prompt {
        return match exchange(&mut assistant, prompt, wait)? {
            Some(reply) => {
                println!("{reply}");
                Ok(())
            }
            None => bail!("The concierge did not reply"),
        };
    }

    if let Some(greeting) = assistant.messages().first() {
        println!("{}", greeting.text());
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Unable to read from stdin")?;
        if read == 0 {
            break;
        }

        match exchange(&mut assistant, line.trim_end_matches(['\r', '\n']), wait)? {
            Some(reply) => println!("{reply}\n"),
            None if line.trim().is_empty() => {}
            None => eprintln!("(no reply, try again)"),
        }
    }

    Ok(())
}

fn exchange<G: ReplyGateway>(
    assistant: &mut AssistantWidget<G>,
    utterance: &str,
    wait: Duration,
) -> Result<Option<String>> {
    if assistant.send(utterance) != SendOutcome::Dispatched {
        return Ok(None);
    }

    match assistant.wait_for_reply(wait) {
        Some(Settled::Replied) => Ok(assistant
            .messages()
            .last()
            .filter(|message| message.role() == Role::Assistant)
            .map(|message| message.text().to_string())),
        Some(Settled::Failed) => Ok(None),
        None => bail!("Timed out after {}s waiting for the concierge", wait.as_secs()),
    }
}
