//! Wallet ledger server binary

use wallet_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting wallet ledger server");

    // Load configuration: explicit file wins, env overrides otherwise
    let config = match std::env::var("LEDGER_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    let ledger = Ledger::open(config).await?;
    let stats = ledger.stats()?;
    tracing::info!(
        wallets = stats.total_wallets,
        transactions = stats.total_transactions,
        "Ledger opened"
    );

    let mut report_timer = tokio::time::interval(tokio::time::Duration::from_secs(60));
    report_timer.tick().await; // First tick fires immediately

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report_timer.tick() => {
                let stats = ledger.stats()?;
                tracing::info!(
                    wallets = stats.total_wallets,
                    transactions = stats.total_transactions,
                    "Ledger stats"
                );
            }
        }
    }

    tracing::info!("Shutting down wallet ledger server");
    ledger.shutdown().await?;

    Ok(())
}
