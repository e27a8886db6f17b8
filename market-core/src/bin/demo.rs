//! Ticket market demo binary
//!
//! Usage: `market-demo [config.toml]`. Without a path the configuration is
//! read from `MARKET_*` environment variables.

use anyhow::Context;
use market_core::{
    spawn_market_actor, BalanceBook, Config, Identity, MarketEvent, MarketHandle, Marketplace,
    Metrics, Storage, TicketId,
};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    tracing::info!("Starting {}", config.service_name);

    let book = BalanceBook::new();
    let storage = Storage::open(&config.storage).context("opening storage")?;
    let market = match storage.load_snapshot()? {
        Some(snapshot) => Marketplace::from_snapshot(snapshot, book.clone())?,
        None => Marketplace::new(config.sale.to_sale()?, book.clone())?,
    };
    let price = market.sale().ticket_price;

    let (buyer1, buyer2) = (Identity::new("buyer1"), Identity::new("buyer2"));
    for buyer in [&buyer1, &buyer2] {
        book.deposit(buyer, price * Decimal::from(10))?;
    }

    let metrics = Metrics::new()?;
    let handle = spawn_market_actor(market, Some(storage), metrics, &config);

    run_scenario(&handle, price, &buyer1, &buyer2).await?;

    handle.checkpoint().await?;

    let operator = handle.operator().await?;
    tracing::info!(
        operator = %operator,
        operator_balance = %book.balance_of(&operator),
        buyer1_balance = %book.balance_of(&buyer1),
        buyer2_balance = %book.balance_of(&buyer2),
        "Final balances"
    );

    handle.shutdown().await?;
    tracing::info!("Shutting down {}", config.service_name);
    Ok(())
}

/// Primary purchase, a rejected double sale, then a resale
async fn run_scenario(
    handle: &MarketHandle,
    price: Decimal,
    buyer1: &Identity,
    buyer2: &Identity,
) -> anyhow::Result<()> {
    let ticket = TicketId::new(1);
    let resale_price = price * Decimal::new(15, 1);

    report(handle.buy_ticket(ticket, buyer1.clone(), price).await)?;
    report(handle.buy_ticket(ticket, buyer2.clone(), price).await)?;
    report(handle.resale_ticket(resale_price, buyer1.clone()).await)?;
    let listed = handle.check_resale().await?;
    tracing::info!(?listed, "Resale listings");

    report(handle.accept_resale(ticket, buyer2.clone(), resale_price).await)?;
    let held1 = handle.ticket_of(buyer1.clone()).await?;
    let held2 = handle.ticket_of(buyer2.clone()).await?;
    let listed = handle.check_resale().await?;
    tracing::info!(buyer1 = ?held1, buyer2 = ?held2, ?listed, "Holdings");

    Ok(())
}

/// Log an operation outcome; only infrastructure failures stop the demo
fn report(result: market_core::Result<MarketEvent>) -> anyhow::Result<()> {
    match result {
        Ok(event) => {
            let json = serde_json::to_string(&event)?;
            tracing::info!(event = %json, "{}", event.operation());
            Ok(())
        }
        Err(e) if e.is_rejection() => {
            tracing::warn!(reason = e.code(), "Rejected: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
