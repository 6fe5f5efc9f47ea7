use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sa_backend::ChatClient;
use sa_core::commands::{self, DocsAction, SessionsAction};
use sa_core::config::Config;
use sa_core::logging;
use sa_core::renderer::ChatRenderer;
use sa_core::repl::run_repl;
use sa_core::style::Style;

#[derive(Debug, Parser)]
#[command(name = "superagent", version)]
#[command(about = "Terminal client for the SuperAgent RAG chat backend")]
struct Cli {
    /// Config file (default: ~/.config/superagent/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend URL, overriding the config file
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Ask one question and print the answer
    Ask {
        message: String,
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        whole: bool,
    },
    /// Manage stored chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Manage knowledge-base documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        None => Config::load_or_default(),
    };
    if let Some(url) = cli.url {
        config.server.base_url = url;
    }

    logging::init(&config.log);

    let user_id = match config.user.resolve_user_id() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: failed to resolve user id: {e}");
            std::process::exit(1);
        }
    };

    let connect_timeout = config.server.connect_timeout();
    let client = match ChatClient::with_connect_timeout(&config.server.base_url, connect_timeout) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    let deadline = config.server.stream_timeout();
    let mut renderer = ChatRenderer::new(io::stdout(), Style::new());

    let code = runtime.block_on(async {
        match cli.command.unwrap_or(Command::Chat) {
            Command::Chat => match run_repl(&client, &user_id, deadline).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("error: {e}");
                    1
                }
            },
            Command::Ask { message, whole } => {
                commands::ask(&client, &user_id, &message, whole, deadline, &mut renderer).await
            }
            Command::Sessions { action } => {
                commands::sessions(&client, &user_id, action, &mut renderer).await
            }
            Command::Docs { action } => commands::docs(&client, action, &mut renderer).await,
        }
    });
    std::process::exit(code);
}
