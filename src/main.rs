//! portfolio-assist binary: relay server, terminal chat and local state tools.

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use portfolio_assist::commands::settings;
use portfolio_assist::config::{self, Credentials};
use portfolio_assist::db::models::ChatMessage;
use portfolio_assist::db::Database;
use portfolio_assist::deadlines::{self, DeadlineFilter};
use portfolio_assist::llm::Attachment;
use portfolio_assist::logging::init_logging;
use portfolio_assist::widget::relay_client::HttpRelayClient;
use portfolio_assist::widget::{ChatWidget, TurnOutcome};
use std::error::Error;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "portfolio-assist", version, about)]
struct Cli {
    /// Directory holding portfolio.db
    #[arg(long, env = "PORTFOLIO_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[command(flatten)]
    assistant: AssistantArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct AssistantArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "ASSISTANT_ID")]
    assistant_id: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,
}

impl AssistantArgs {
    fn credentials(&self, db: &Database) -> Result<Credentials, portfolio_assist::llm::AssistError> {
        Credentials::resolve(
            self.openai_api_key.clone(),
            self.assistant_id.clone(),
            self.openai_base_url.clone(),
            db,
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay endpoint (POST /api/assist)
    Serve {
        #[arg(long, env = "ASSIST_LISTEN_ADDR", default_value = "127.0.0.1:3000")]
        listen_addr: SocketAddr,
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,
        /// 0 polls without limit
        #[arg(long, default_value_t = 120)]
        max_polls: u32,
    },
    /// Chat through a running relay. `/attach <path>` sends a file, `/clear`
    /// starts a new conversation, `/quit` exits.
    Chat {
        #[arg(long, env = "ASSIST_RELAY_URL", default_value = "http://127.0.0.1:3000/api/assist")]
        relay_url: String,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    Deadlines {
        #[command(subcommand)]
        action: DeadlinesAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set { key: String, value: String },
    Unset { key: String },
}

#[derive(Subcommand)]
enum DeadlinesAction {
    List {
        /// all, 7days or 30days
        #[arg(long, default_value = "all")]
        filter: DeadlineFilter,
    },
    /// Replace the stored list with a JSON array of deadlines
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    let db = Arc::new(Database::new(&cli.data_dir)?);

    match cli.command {
        Command::Serve {
            listen_addr,
            poll_interval_ms,
            max_polls,
        } => {
            let credentials = cli.assistant.credentials(&db);
            let poll = config::poll_policy(poll_interval_ms, max_polls);
            portfolio_assist::run(listen_addr, credentials, poll).await?;
        }
        Command::Chat { relay_url } => {
            let enabled = cli.assistant.credentials(&db).is_ok();
            chat(HttpRelayClient::new(relay_url), db, enabled).await?;
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                for (key, value) in settings::get_settings(&db)? {
                    println!("{key} = {value}");
                }
            }
            SettingsAction::Set { key, value } => settings::set_setting(&db, &key, &value)?,
            SettingsAction::Unset { key } => settings::delete_setting(&db, &key)?,
        },
        Command::Deadlines { action } => match action {
            DeadlinesAction::List { filter } => {
                let all = deadlines::load_deadlines(&db)?;
                let today = Local::now().date_naive();
                for d in deadlines::filter_deadlines(&all, filter, today) {
                    println!("{}  [{:?}]  {}", d.date, d.label, d.title);
                    if !d.notes.is_empty() {
                        println!("            {}", d.notes);
                    }
                }
            }
            DeadlinesAction::Import { path } => {
                let json = std::fs::read_to_string(&path)?;
                let list: Vec<deadlines::Deadline> = serde_json::from_str(&json)?;
                deadlines::save_deadlines(&db, &list)?;
                println!("Imported {} deadlines", list.len());
            }
        },
    }

    Ok(())
}

async fn chat(
    relay: HttpRelayClient,
    db: Arc<Database>,
    enabled: bool,
) -> Result<(), Box<dyn Error>> {
    let mut widget = ChatWidget::new(relay, db, enabled);

    if !widget.is_enabled() {
        println!("Chatbot Niet Geconfigureerd");
        println!("Voeg je OpenAI API key en Assistant ID toe aan .env.local om de chatbot te gebruiken.");
    }
    if widget.transcript().is_empty() {
        println!("Hallo! Hoe kan ik je helpen?");
    }
    for message in widget.transcript() {
        print_message(message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let outcome = if line.trim() == "/quit" {
            break;
        } else if line.trim() == "/clear" {
            widget.reset();
            println!("Hallo! Hoe kan ik je helpen?");
            prompt()?;
            continue;
        } else if let Some(path) = line.strip_prefix("/attach ") {
            match read_attachment(Path::new(path.trim())).await {
                Ok(file) => widget.attach(file).await,
                Err(err) => {
                    eprintln!("Could not read {}: {err}", path.trim());
                    prompt()?;
                    continue;
                }
            }
        } else {
            widget.submit(&line).await
        };

        match outcome {
            TurnOutcome::Replied(message)
            | TurnOutcome::Failed(message)
            | TurnOutcome::NotConfigured(message) => print_message(&message),
            TurnOutcome::Rejected(notice) => eprintln!("{notice}"),
            TurnOutcome::Busy | TurnOutcome::Ignored => {}
        }
        prompt()?;
    }
    Ok(())
}

async fn read_attachment(path: &Path) -> std::io::Result<Attachment> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    Ok(Attachment::new(file_name, bytes))
}

fn print_message(message: &ChatMessage) {
    let who = if message.is_assistant { "assistent" } else { "jij" };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    println!("[{time}] {who}: {}", message.content);
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}
