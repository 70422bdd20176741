//! Reckon demo
//!
//! Memoizes a recursive workload with the global store, keeps the store
//! trimmed in the background and prints its state as JSON.

use std::time::{Duration, Instant};

use anyhow::Context;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reckon::{global, spawn_shrink_task, Config, Memoized};

static FIB: OnceCell<Memoized<u64, u64>> = OnceCell::new();

/// Naive recursive Fibonacci, memoized through the global store.
fn fib(n: u64) -> u64 {
    match FIB.get() {
        Some(memoized) => memoized.call(n),
        None => fib_body(&n),
    }
}

fn fib_body(n: &u64) -> u64 {
    if *n < 2 {
        *n
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reckon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: strategy={}, target_usage={}, default_ttl={}s, shrink_interval={}s",
        config.strategy, config.target_usage, config.default_ttl, config.shrink_interval
    );

    let store = global::store();
    let shrink_handle = spawn_shrink_task(store.clone(), config.shrink_interval);

    FIB.set(global::memoize(fib_body).with_name("fib"))
        .map_err(|_| anyhow::anyhow!("fib already memoized"))?;

    let start = Instant::now();
    let cold = fib(80);
    let cold_elapsed = start.elapsed();

    let start = Instant::now();
    let warm = fib(80);
    let warm_elapsed = start.elapsed();
    info!(
        "fib(80) = {} (cold {:?}, warm {:?})",
        cold, cold_elapsed, warm_elapsed
    );
    anyhow::ensure!(cold == warm, "memoized result changed between calls");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = serde_json::json!({
        "info": global::info(),
        "hit_rate": store.stats().hit_rate(),
        "entries": store.entries().into_iter().take(5).collect::<Vec<_>>(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render cache info")?
    );

    shrink_handle.abort();
    info!("Demo complete");
    Ok(())
}
