use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use eyeon_core::pipeline::session_controller::SessionController;
use eyeon_core::shared::settings::{ExecutorKind, Settings};

/// Watches a camera for known and unknown faces and reports sightings.
#[derive(Parser)]
#[command(name = "eyeon")]
struct Cli {
    /// Settings JSON file (defaults to the per-user config file).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a surveillance session until Enter is pressed or the duration elapses.
    Watch {
        #[arg(long)]
        user: String,

        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<u64>,

        /// Concurrency backend: thread or tokio.
        #[arg(long)]
        executor: Option<ExecutorKind>,
    },
    /// Check that a reference image contains an encodable face.
    Encode {
        #[arg(long)]
        user: String,

        /// Image URL or local path.
        #[arg(long)]
        image: String,
    },
    /// Load a user's identity cache and print a summary.
    Roster {
        #[arg(long)]
        user: String,
    },
    /// Print the session status.
    Status,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Watch {
            user,
            duration,
            executor,
        } => {
            if let Some(executor) = executor {
                settings.executor = executor;
            }
            let controller = SessionController::from_settings(&settings)?;
            run_watch(&controller, &user, duration.map(Duration::from_secs))
        }
        Command::Encode { user, image } => {
            let controller = SessionController::from_settings(&settings)?;
            print_json(&controller.encode_reference(&image, &user))
        }
        Command::Roster { user } => {
            let controller = SessionController::from_settings(&settings)?;
            let response = controller.reload(&user);
            if let Some(cache) = controller.caches().peek(&user) {
                for member in cache.family() {
                    log::info!("family: {}", member.name);
                }
                for group in cache.categories() {
                    log::info!("category: {} ({} references)", group.name, group.entries.len());
                }
            }
            print_json(&response)
        }
        Command::Status => {
            let controller = SessionController::from_settings(&settings)?;
            print_json(&controller.status())
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, Box<dyn std::error::Error>> {
    let settings = match path {
        Some(path) => {
            Settings::load_from(path)?.with_env_overrides(|key| std::env::var(key).ok())
        }
        None => Settings::load()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn run_watch(
    controller: &SessionController,
    user: &str,
    duration: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = controller.start(user);
    print_json(&started)?;
    if !started.success {
        return Err(started.message.into());
    }

    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = done_tx.send(());
    });
    eprintln!("Watching for user {user}; press Enter to stop");

    match duration {
        Some(limit) => {
            let _ = done_rx.recv_timeout(limit);
        }
        None => {
            let _ = done_rx.recv();
        }
    }

    print_json(&controller.stop())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
