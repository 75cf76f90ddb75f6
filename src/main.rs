use std::io;
use std::sync::Arc;

use call_client::authority::{AuthorityError, GameAuthority};
use call_client::config::{ClientConfig, ConfigError, Tuning};
use call_client::console::{Command as ConsoleCommand, HELP, ParseError, parse_line, render_cards, render_view};
use call_client::http::HttpAuthority;
use call_client::orchestrator::{ClientEvent, ClientOrchestrator, ClientView, Intent};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Authority(#[from] AuthorityError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "call-client", about = "Terminal player for the Call card game")]
struct Cli {
    /// Page URL of the game; `?key=...` carries the admin key.
    #[arg(long, env = "CALL_URL", default_value = "http://127.0.0.1:7878/")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join the game and play from this terminal.
    Play {
        #[arg(long, env = "CALL_NAME")]
        name: Option<String>,
    },
    /// Print the card catalog and exit.
    Cards,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = ClientConfig::from_page_url(&cli.url, Tuning::from_env())?;

    match cli.command {
        Command::Play { name } => run_play(config, name).await,
        Command::Cards => run_cards(&config).await,
    }
}

async fn run_cards(config: &ClientConfig) -> Result<(), CliError> {
    let authority = HttpAuthority::new(config)?;
    let cards = authority.cards().await?;
    println!("{}", render_cards(&cards));
    Ok(())
}

async fn run_play(config: ClientConfig, name: Option<String>) -> Result<(), CliError> {
    let authority = Arc::new(HttpAuthority::new(&config)?);
    let (orchestrator, view, events) = ClientOrchestrator::new(authority, config);
    let orchestrator = match name {
        Some(name) => orchestrator.with_name(name),
        None => orchestrator,
    };

    let (intents, intents_rx) = mpsc::unbounded_channel();
    let (quit, quit_rx) = oneshot::channel::<()>();
    let terminal = tokio::spawn(terminal_loop(view, events, intents, quit));

    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = quit_rx => {}
        }
    };
    orchestrator.run(intents_rx, shutdown).await;

    terminal.abort();
    Ok(())
}

async fn terminal_loop(
    mut view: watch::Receiver<ClientView>,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
    intents: mpsc::UnboundedSender<Intent>,
    quit: oneshot::Sender<()>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            Ok(()) = view.changed() => {
                let text = render_view(&view.borrow_and_update());
                println!("{text}");
            }
            Some(event) = events.recv() => match event {
                ClientEvent::Celebrate => println!("*** consensus: everyone picked the same card ***"),
                ClientEvent::Rebootstrapped { expired } => {
                    println!("session {expired} expired; rejoining as a new player");
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_line(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(ConsoleCommand::Help) => println!("{HELP}"),
                    Ok(ConsoleCommand::Cards) => {
                        let text = match &*view.borrow() {
                            ClientView::Ready(ready) => render_cards(&ready.cards),
                            ClientView::Loading => "loading...".to_owned(),
                        };
                        println!("{text}");
                    }
                    Ok(ConsoleCommand::Intent(intent)) => {
                        if intents.send(intent).is_err() {
                            break;
                        }
                    }
                    Err(ParseError::Empty) => {}
                    Err(e) => eprintln!("{e}; {HELP}"),
                },
                Ok(None) => break,
                Err(e) => {
                    eprintln!("stdin failed: {e}");
                    break;
                }
            },
        }
    }

    let _ = quit.send(());
}
