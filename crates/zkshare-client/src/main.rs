//! zkshare command line tool.
//!
//! # Usage
//!
//! ```bash
//! # Share a secret (read from stdin when --secret is omitted)
//! echo -n hunter2 | zkshare create --pin 123456
//!
//! # Open a link (works once)
//! zkshare access 'https://share.example/access?token=...&data=...' --pin 123456
//!
//! # Share a whole .env file, one link per variable
//! zkshare env seal --pin 123456 --input .env --output .zk.env
//! zkshare env open --pin 123456 --input .zk.env
//! ```

use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;
use zkshare_client::{
    ClientError, HttpBroker, ProtocolConfig, ShareLinkProtocol, SystemEnv, open_env, seal_env,
};
use zkshare_core::DEFAULT_MAX_SECRET_LEN;

/// One-time secret sharing
#[derive(Parser, Debug)]
#[command(name = "zkshare")]
#[command(about = "Share a secret through a single-use link and a PIN")]
#[command(version)]
struct Cli {
    /// Broker base URL
    #[arg(long, global = true, env = "ZKSHARE_SERVER", default_value = "http://localhost:3001")]
    server: String,

    /// Largest secret accepted, in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_SECRET_LEN)]
    max_secret_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a single-use link for a secret
    Create {
        /// The secret (read from stdin when omitted)
        #[arg(long)]
        secret: Option<String>,

        #[command(flatten)]
        pin: PinArg,

        #[command(flatten)]
        ttl: TtlArg,

        /// Origin the link points at (defaults to the broker URL)
        #[arg(long, env = "ZKSHARE_BASE_URL")]
        base_url: Option<String>,
    },

    /// Open a link and print the secret. Consumes the link.
    Access {
        /// The link, or just its query string
        link: String,

        #[command(flatten)]
        pin: PinArg,
    },

    /// Share `.env` files
    #[command(subcommand)]
    Env(EnvCommand),
}

#[derive(Subcommand, Debug)]
enum EnvCommand {
    /// Replace every KEY=value with KEY_ENC=<link>
    Seal {
        /// Plain .env file
        #[arg(long, default_value = ".env")]
        input: PathBuf,

        /// Where to write the sealed file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pin: PinArg,

        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Redeem every KEY_ENC line and print KEY=value. Consumes every link.
    Open {
        /// Sealed .env file
        #[arg(long, default_value = ".zk.env")]
        input: PathBuf,

        /// Where to write the opened file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pin: PinArg,
    },
}

#[derive(ClapArgs, Debug)]
struct PinArg {
    /// Six-digit PIN, shared with the recipient out of band
    #[arg(long, env = "ZKSHARE_PIN", hide_env_values = true)]
    pin: String,
}

#[derive(ClapArgs, Debug)]
struct TtlArg {
    /// Hours until the link expires (broker default when omitted)
    #[arg(long)]
    ttl_hours: Option<u64>,
}

impl TtlArg {
    fn duration(&self) -> Option<Duration> {
        self.ttl_hours.map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
    }
}

type Protocol = ShareLinkProtocol<HttpBroker, SystemEnv>;

fn read_secret(secret: Option<String>) -> Result<Zeroizing<String>, ClientError> {
    if let Some(secret) = secret {
        return Ok(Zeroizing::new(secret));
    }
    let mut input = Zeroizing::new(String::new());
    io::stdin().read_to_string(&mut input)?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(input)
}

fn emit(output: Option<&PathBuf>, text: &str) -> Result<(), ClientError> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn report_failures(failures: &[(String, zkshare_client::ShareError)]) -> Result<(), ClientError> {
    let mut stderr = io::stderr().lock();
    for (key, err) in failures {
        writeln!(stderr, "warning: {key}: {err}")?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let broker = HttpBroker::new(&cli.server)?;
    let protocol: Protocol = ShareLinkProtocol::new(
        broker,
        SystemEnv::new(),
        ProtocolConfig { max_secret_len: cli.max_secret_len },
    );

    match cli.command {
        Command::Create { secret, pin, ttl, base_url } => {
            let secret = read_secret(secret)?;
            let created = protocol.create(secret.as_bytes(), &pin.pin, ttl.duration()).await?;

            let origin = base_url.as_deref().unwrap_or(protocol.broker().base_url());
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", created.link.to_url(origin))?;
            tracing::info!(expires_at = created.expires_at_secs, "link created");
        },
        Command::Access { link, pin } => {
            let secret = protocol.access(&link, &pin.pin).await?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&secret)?;
            stdout.write_all(b"\n")?;
        },
        Command::Env(EnvCommand::Seal { input, output, pin, ttl }) => {
            let plain = Zeroizing::new(std::fs::read_to_string(&input)?);
            let sealed = seal_env(&protocol, &plain, &pin.pin, ttl.duration()).await?;

            emit(output.as_ref(), &sealed.text)?;
            report_failures(&sealed.failures)?;
            tracing::info!(sealed = sealed.sealed, failed = sealed.failures.len(), "env sealed");
        },
        Command::Env(EnvCommand::Open { input, output, pin }) => {
            let sealed = std::fs::read_to_string(&input)?;
            let opened = open_env(&protocol, &sealed, &pin.pin).await?;

            emit(output.as_ref(), &opened.to_env_text())?;
            report_failures(&opened.failures)?;
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(io::stderr().lock(), "error: {err}");
            if matches!(&err, ClientError::Share(share) if share.is_terminal()) {
                let _ = writeln!(io::stderr().lock(), "ask the sender for a new link");
            }
            ExitCode::FAILURE
        },
    }
}
