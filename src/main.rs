use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use termin_webdriver::{BookingConfig, ChromeLauncher, CycleOutcome, MailSlurpClient, Orchestrator};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the artifact output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Pass --no-sandbox to Chrome (containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// MailSlurp API key
    #[arg(long, env = "MAILSLURP_API_KEY", hide_env_values = true)]
    mailslurp_api_key: Option<String>,

    /// Run a single cycle instead of polling until booked
    #[arg(long)]
    once: bool,
}

fn load_config(args: &Args) -> anyhow::Result<BookingConfig> {
    let mut config = BookingConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.headless {
        config.browser.headless = true;
    }
    if args.no_sandbox {
        config.browser.no_sandbox = true;
    }
    if let Some(path) = &args.chrome_path {
        config.browser.chrome_path = Some(path.clone());
    }
    if let Some(key) = &args.mailslurp_api_key {
        config.mail.api_key = Some(key.clone());
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let api_key = config
        .mail
        .api_key
        .clone()
        .context("MailSlurp API key missing (set MAILSLURP_API_KEY or mail.api_key)")?;

    log::info!(
        "Looking for '{}' at {} location(s), dates {}, times {}",
        config.service,
        if config.locations.is_empty() {
            "all".to_string()
        } else {
            config.locations.len().to_string()
        },
        config.dates,
        config.times
    );

    let launcher = ChromeLauncher::new(config.browser.clone(), config.timeouts);
    let mailbox = MailSlurpClient::new(&config.mail.base_url, &api_key)?;
    let mut orchestrator = Orchestrator::new(config, launcher, mailbox);

    let receipt = if args.once {
        match orchestrator.run_cycle().await? {
            CycleOutcome::Booked(receipt) => receipt,
            CycleOutcome::NoAvailability(reason) => {
                log::info!("Nothing booked: {}", reason);
                return Ok(());
            }
            CycleOutcome::Failed(e) | CycleOutcome::Blocked(e) => {
                return Err(e).context("booking cycle failed");
            }
        }
    } else {
        orchestrator.run().await?
    };

    log::info!(
        "Booked {} for <{}>",
        receipt.booked.slot.instant(),
        receipt.booked.inbox.email_address
    );
    for path in &receipt.artifacts.saved {
        log::info!("  {}", path.display());
    }
    if !receipt.artifacts.failed.is_empty() {
        log::warn!("{} artifact(s) could not be saved", receipt.artifacts.failed.len());
    }

    Ok(())
}
