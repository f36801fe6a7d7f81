use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use queueline_core::{
    decode_link, encode_link, format_wait, Authenticator, BackupClient, CredentialStore,
    Distributor, DisplayReader, FileStore, QueueStore, Session, ViewerStatus, POLL_INTERVAL,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Queueline CLI - operator front end for the queue-ticketing system
#[derive(Parser)]
#[command(name = "queueline")]
#[command(about = "Issue, call and watch queue tickets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backup server URL, e.g. http://127.0.0.1:8420
    #[arg(long, global = true)]
    server: Option<String>,

    /// Local data directory override
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to a queue (claims the name on first use)
    Login {
        /// Queue name
        queue: String,
        /// Queue password
        password: String,
    },

    /// Re-authenticate from a distributor hand-off token
    Resume {
        /// Queue name
        queue: String,
        /// Hand-off token printed by a previous login
        token: String,
    },

    /// Issue the next ticket
    Issue,

    /// Call the next ticket to the counter
    Call,

    /// Show the current queue state
    Status,

    /// Reset all counters and tickets
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Delete this queue and its credentials
    DeleteQueue {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Print the obfuscated display-link parameters for a ticket
    Link {
        /// Ticket number
        number: u64,
    },

    /// Watch a queue the way the display page does
    Watch {
        /// Queue name (plain)
        #[arg(long)]
        queue: Option<String>,
        /// Viewer's own ticket number (plain)
        #[arg(long)]
        number: Option<u64>,
        /// Obfuscated `queue` parameter from a display link
        #[arg(long)]
        queue_param: Option<String>,
        /// Obfuscated `number` parameter from a display link
        #[arg(long)]
        number_param: Option<String>,
        /// Print one snapshot and exit instead of polling
        #[arg(long)]
        once: bool,
    },

    /// Trigger the server's inactivity sweep (requires --server)
    Cleanup,
}

/// Local data directory: the CLI's stand-in for browser storage.
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("Queueline")
}

struct Env {
    credentials: CredentialStore,
    queues: QueueStore,
    session_path: PathBuf,
    server: Option<BackupClient>,
}

impl Env {
    fn open(cli: &Cli) -> Result<Self> {
        let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
        let store = Arc::new(FileStore::open(data_dir.join("store"))?);

        let server = match &cli.server {
            Some(url) => Some(BackupClient::new(url)?),
            None => None,
        };
        let (credentials, queues) = match &server {
            Some(client) => (
                CredentialStore::with_mirror(store.clone(), client.clone()),
                QueueStore::with_mirror(store, client.clone()),
            ),
            None => (
                CredentialStore::new(store.clone()),
                QueueStore::new(store),
            ),
        };

        Ok(Self {
            credentials,
            queues,
            session_path: data_dir.join("session.json"),
            server,
        })
    }

    fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.credentials.clone(), self.queues.clone())
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.session_path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    fn clear_session(&self) {
        let _ = std::fs::remove_file(&self.session_path);
    }

    /// Load and validate the stored session. An invalid or expired
    /// session is cleared and the operator is sent back to login.
    fn require_session(&self) -> Result<Session> {
        let raw = std::fs::read_to_string(&self.session_path)
            .context("Not logged in; run `queueline login <queue> <password>`")?;
        let session: Session = serde_json::from_str(&raw)?;
        if let Err(reason) = session.validate() {
            self.clear_session();
            bail!("{}; please log in again", reason);
        }
        Ok(session)
    }

    fn distributor(&self, session: &Session) -> Distributor {
        Distributor::new(
            &session.queue_name,
            self.queues.clone(),
            self.credentials.clone(),
        )
    }
}

/// Ask the operator to retype the queue name before a destructive step.
fn confirm(queue_name: &str, action: &str) -> Result<bool> {
    print!("{} queue '{}'? Type the queue name to confirm: ", action, queue_name);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim() == queue_name)
}

fn print_viewer(status: &ViewerStatus) {
    match status {
        ViewerStatus::Called { waited } => {
            match waited {
                Some(w) => println!("Called - proceed to the counter (waited {})", format_wait(*w)),
                None => println!("Called - proceed to the counter"),
            }
        }
        ViewerStatus::Waiting { ahead, waited } => match waited {
            Some(w) => println!("{} ticket(s) ahead (waiting {})", ahead, format_wait(*w)),
            None => println!("{} ticket(s) ahead", ahead),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();
    let env = Env::open(&cli)?;

    match &cli.command {
        Commands::Login { queue, password } => {
            let login = env.authenticator().login(queue, password).await?;
            env.save_session(&login.session)?;
            if login.created {
                println!("Queue '{}' created.", queue);
            } else {
                println!("Logged in to queue '{}'.", queue);
            }
            println!("Hand-off token: {}", login.token.encode());
        }

        Commands::Resume { queue, token } => {
            let session = env.authenticator().reauthenticate(queue, token).await?;
            env.save_session(&session)?;
            println!("Session resumed for queue '{}'.", queue);
        }

        Commands::Issue => {
            let session = env.require_session()?;
            let ticket = env.distributor(&session).issue_next().await?;
            println!("Issued ticket {}", ticket.number);
        }

        Commands::Call => {
            let session = env.require_session()?;
            match env.distributor(&session).call_next().await? {
                queueline_core::CallOutcome::Called(ticket) => {
                    println!("Now calling ticket {}", ticket.number)
                }
                queueline_core::CallOutcome::NothingToCall => {
                    println!("Nothing left to call")
                }
                queueline_core::CallOutcome::Diverged { expected } => {
                    warn!("Ticket {} was missing; reload and try again", expected)
                }
            }
        }

        Commands::Status => {
            let session = env.require_session()?;
            let state = env.distributor(&session).state()?;
            println!("Queue:       {}", state.queue_name);
            println!("Issued:      {}", state.next_issued);
            println!("Calling:     {}", state.calling);
            println!("Outstanding: {}", state.outstanding);
        }

        Commands::Reset { yes } => {
            let session = env.require_session()?;
            if !yes && !confirm(&session.queue_name, "Reset")? {
                println!("Aborted.");
                return Ok(());
            }
            env.distributor(&session).reset_all().await?;
            println!("Queue '{}' reset.", session.queue_name);
        }

        Commands::DeleteQueue { yes } => {
            let session = env.require_session()?;
            if !yes && !confirm(&session.queue_name, "Delete")? {
                println!("Aborted.");
                return Ok(());
            }
            env.distributor(&session).delete_queue().await?;
            env.clear_session();
            println!(
                "Queue '{}' deleted. Log in to continue.",
                session.queue_name
            );
        }

        Commands::Link { number } => {
            let session = env.require_session()?;
            let (queue_param, number_param) = encode_link(&session.queue_name, *number);
            println!("queue={}&number={}", queue_param, number_param);
        }

        Commands::Watch {
            queue,
            number,
            queue_param,
            number_param,
            once,
        } => {
            let (queue_name, own_number) = match (queue, queue_param) {
                (Some(name), _) => (name.clone(), *number),
                (None, Some(qp)) => {
                    let np = number_param
                        .as_deref()
                        .context("--queue-param requires --number-param")?;
                    let link = decode_link(qp, np)?;
                    (link.queue_name, Some(link.number))
                }
                (None, None) => bail!("Pass --queue or --queue-param"),
            };

            env.authenticator().display_access(&queue_name)?;
            let reader = DisplayReader::new(env.queues.clone(), &queue_name, own_number);

            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                let view = reader.snapshot().await?;
                match view.calling {
                    Some(n) => println!("Now serving: {}", n),
                    None => println!("Waiting for the first call"),
                }
                if let Some(viewer) = &view.viewer {
                    print_viewer(viewer);
                }
                if *once {
                    break;
                }
            }
        }

        Commands::Cleanup => {
            let client = env
                .server
                .as_ref()
                .context("Cleanup needs --server <url>")?;
            let report = client.manual_cleanup().await?;
            info!("Cleanup triggered");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
