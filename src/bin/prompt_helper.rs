//! Prompt helper for editor integrations.
//!
//! Reads text from a file or stdin, wraps it in one of three prompt
//! templates, and POSTs it to the gateway's completions endpoint. Only the
//! extracted completion goes to stdout; all diagnostics go to stderr.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use local_llm_gateway::client::{Action, DEFAULT_SERVER_URL, GatewayClient, prepare_request};

#[derive(Parser, Debug)]
#[command(name = "prompt-helper", about = "Send editor text through the local gateway")]
struct Cli {
    /// What to ask the model to do with the input.
    #[arg(long, value_enum, default_value = "summarize")]
    action: Action,

    /// Custom prompt prefix, required for --action custom.
    #[arg(long)]
    prompt: Option<String>,

    /// Max tokens to generate (defaults depend on the action).
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Gateway base URL.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Read input from this file instead of stdin.
    #[arg(long)]
    input_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("[ERROR] {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, String> {
    let content = read_input(cli.input_file.as_deref())?;

    // Input validation happens before the HTTP client is even built, so no
    // request ever goes out for bad input.
    let (prompt, max_tokens) =
        prepare_request(cli.action, cli.prompt.as_deref(), cli.max_tokens, &content)
            .map_err(|err| err.to_string())?;

    let client = GatewayClient::new(&cli.server_url).map_err(|err| err.to_string())?;
    client
        .complete(&prompt, max_tokens)
        .await
        .map_err(|err| err.to_string())
}

fn read_input(path: Option<&std::path::Path>) -> Result<String, String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| format!("could not read file {}: {err}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("could not read stdin: {err}"))?;
            Ok(buffer)
        }
    }
}
