//! `khqr-pay` command-line entry point.
//!
//! ```text
//! khqr-pay <config.json>        build a QR payload and poll until settled
//! khqr-pay store-token <token>  save the Bakong token in the OS keyring
//! khqr-pay clear-token          remove the saved token
//! ```

use anyhow::{bail, Context};
use khqr_pay::{
    build_payload, credentials, logging, start_polling, BakongClient, BearerToken, Fingerprint,
    KhqrConfig, SessionOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "usage: khqr-pay <config.json> | store-token <token> | clear-token";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["store-token", token] => {
            credentials::store_token(&BearerToken::new(*token))?;
            println!("token stored");
            Ok(())
        }
        ["clear-token"] => {
            credentials::clear_token()?;
            println!("token cleared");
            Ok(())
        }
        [path] if !path.starts_with('-') => run(PathBuf::from(*path)).await,
        _ => bail!(USAGE),
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = KhqrConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let _log_guard = logging::init(&config.log);
    info!(build = %khqr_pay::build_info(), "Starting khqr-pay");

    let payload = build_payload(&config.merchant, config.qr_kind).context("building payload")?;
    let fingerprint = Fingerprint::of(&payload);
    println!("payload:     {payload}");
    println!("fingerprint: {fingerprint}");

    let token = config
        .token
        .clone()
        .map(BearerToken::new)
        .filter(|t| !t.is_blank())
        .or_else(credentials::load_token);
    let Some(token) = token else {
        info!("no Bakong token configured; skipping payment polling");
        return Ok(());
    };

    let client = Arc::new(BakongClient::new(&config.settlement)?);
    let mut session = start_polling(client, fingerprint, config.polling, token)?;
    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = session.outcome().await;
    let diagnostics = session.diagnostics();
    info!(
        lookups = diagnostics.lookups,
        retryable_failures = diagnostics.retryable_failures,
        "polling finished"
    );

    match outcome {
        Some(SessionOutcome::Paid) => println!("status:      PAID"),
        Some(SessionOutcome::Expired) => println!("status:      EXPIRED"),
        Some(SessionOutcome::Failed(e)) => return Err(e).context("payment polling stopped"),
        None => println!("status:      CANCELLED"),
    }
    Ok(())
}
