use aloy::dispatch::DispatchResult;
use aloy::gateway::SubmitRequest;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "aloy-core")]
#[command(about = "Aloy core: natural-language command dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the HTTP service (POST /commands). Connects to the broker at startup.
    Serve {
        /// Config file path (default: ALOY_CONFIG_PATH or ~/.aloy/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from ALOY_CORE_PORT, config, or 1100)
        #[arg(long, short)]
        port: Option<u16>,

        /// Keep published messages in memory instead of connecting to the broker.
        #[arg(long)]
        dry_run: bool,
    },

    /// Submit one message to a running service and print the reply.
    Send {
        /// Config file path (default: ALOY_CONFIG_PATH or ~/.aloy/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Interactive prompt: each line is submitted to a running service.
    Chat {
        /// Config file path (default: ALOY_CONFIG_PATH or ~/.aloy/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let env_files = load_env_files();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    for (path, result) in env_files {
        match result {
            Ok(()) => log::info!("loaded environment from {}", path.display()),
            Err(e) => log::debug!("{} not loaded: {}", path.display(), e),
        }
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("aloy-core {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve {
            config,
            port,
            dry_run,
        }) => {
            if let Err(e) = run_serve(config, port, dry_run).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send { config, text }) => {
            if let Err(e) = run_send(config, text.join(" ")).await {
                log::error!("send failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Load `../.env.local` then `./.env.local`; the local file wins.
/// Runs before logger init; the caller logs the results.
fn load_env_files() -> Vec<(PathBuf, Result<(), dotenvy::Error>)> {
    [Path::new("..").join(".env.local"), PathBuf::from(".env.local")]
        .into_iter()
        .map(|path| {
            let result = dotenvy::from_path_override(&path);
            (path, result)
        })
        .collect()
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let (mut config, path) = aloy::config::load_config(config_path)?;
    log::debug!("config: {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting aloy core on {}:{}", config.gateway.bind, config.gateway.port);
    aloy::gateway::run_gateway(config, dry_run).await
}

/// Base URL clients use to reach the service; a wildcard bind is reached over loopback.
fn service_url(config: &aloy::config::Config) -> String {
    let bind = config.gateway.bind.trim();
    let host = if bind.is_empty() || bind == "0.0.0.0" || bind == "::" {
        "127.0.0.1"
    } else {
        bind
    };
    format!("http://{}:{}/commands", host, config.gateway.port)
}

async fn submit(
    client: &reqwest::Client,
    url: &str,
    message: String,
) -> anyhow::Result<DispatchResult> {
    let res = client
        .post(url)
        .json(&SubmitRequest { message })
        .send()
        .await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("{} {}", status, body.trim());
    }
    Ok(res.json().await?)
}

async fn run_send(config_path: Option<PathBuf>, text: String) -> anyhow::Result<()> {
    let (config, _) = aloy::config::load_config(config_path)?;
    let url = service_url(&config);
    let result = submit(&reqwest::Client::new(), &url, text).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = aloy::config::load_config(config_path)?;
    let url = service_url(&config);
    let client = reqwest::Client::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        match submit(&client, &url, input.to_string()).await {
            Ok(result) => {
                println!("< [{}] {}", status_label(&result), result.message.trim());
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}

fn status_label(result: &DispatchResult) -> &'static str {
    match result.status {
        aloy::dispatch::DispatchStatus::Success => "success",
        aloy::dispatch::DispatchStatus::Ok => "ok",
        aloy::dispatch::DispatchStatus::Unknown => "unknown",
    }
}
