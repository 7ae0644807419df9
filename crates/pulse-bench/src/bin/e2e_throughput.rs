//! End-to-end throughput benchmark for the Pulse broker.
//!
//! Runs publishers and subscribers in-process and measures how many handler
//! invocations complete per second, then shuts the broker down gracefully.
//!
//! ```bash
//! e2e_throughput [subscribers] [publishers] [config.toml]
//! ```

use anyhow::{Context, Result};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenvis_pulse_broker::{metrics, Broker, BrokerConfig, Message};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOPIC: &str = "benchmark";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;
const PUBLISH_BATCH: usize = 64;
const MAX_BACKLOG: usize = 100_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenvis_pulse_broker=info,e2e_throughput=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let num_subscribers = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let num_publishers = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(4);
    let config = match args.get(3) {
        Some(path) => BrokerConfig::from_file(path)
            .with_context(|| format!("Failed to load broker config: {path}"))?,
        None => BrokerConfig::load().context("Failed to load broker config")?,
    };

    metrics::describe_metrics();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║         Pulse Broker End-to-End Throughput Benchmark         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_pubsub_benchmark(config, num_subscribers, num_publishers).await
}

async fn run_pubsub_benchmark(
    config: BrokerConfig,
    num_subscribers: usize,
    num_publishers: usize,
) -> Result<()> {
    println!(
        "📊 Pub/Sub Benchmark: {} subscribers, {} publishers",
        num_subscribers, num_publishers
    );
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let broker: Broker<Bytes> = Broker::with_config(config);
    let delivered = Arc::new(AtomicU64::new(0));

    let subscriptions = (0..num_subscribers)
        .map(|_| {
            let delivered = Arc::clone(&delivered);
            broker.subscribe(TOPIC, move |_msg: Message| {
                let delivered = Arc::clone(&delivered);
                async move {
                    delivered.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to subscribe")?;
    info!(subscribers = subscriptions.len(), "Subscribers ready");

    let running = Arc::new(AtomicBool::new(true));
    let payload = Bytes::from(vec![0u8; 64]);
    let mut publishers = Vec::with_capacity(num_publishers);
    for _ in 0..num_publishers {
        let broker = broker.clone();
        let running = Arc::clone(&running);
        let payload = payload.clone();
        publishers.push(tokio::spawn(async move {
            'publish: while running.load(Ordering::Relaxed) {
                for _ in 0..PUBLISH_BATCH {
                    if broker.publish(TOPIC, payload.clone()).is_err() {
                        break 'publish;
                    }
                }
                // Keep the queues from outrunning the workers.
                if broker.in_flight() > MAX_BACKLOG {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                } else {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    delivered.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = delivered.load(Ordering::SeqCst);

    running.store(false, Ordering::Relaxed);
    for publisher in publishers {
        publisher.await.context("Publisher task failed")?;
    }

    let drain_start = Instant::now();
    let backlog = broker.in_flight();
    if let Err(e) = broker.shutdown().await {
        warn!(error = %e, backlog, "Broker did not drain before the close timeout");
    }
    let drain = drain_start.elapsed();

    let per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Subscribers:          {:>10}                           ║",
        num_subscribers
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        elapsed.as_secs_f64()
    );
    println!(
        "║  Deliveries:           {:>10}                           ║",
        total
    );
    println!(
        "║  Throughput:           {:>10.0} msg/s                    ║",
        per_sec
    );
    println!(
        "║  Shutdown backlog:     {:>10}                           ║",
        backlog
    );
    println!(
        "║  Shutdown drain:       {:>10.2}s                          ║",
        drain.as_secs_f64()
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    Ok(())
}
