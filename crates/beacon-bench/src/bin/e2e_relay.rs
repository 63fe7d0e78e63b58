//! End-to-end relay benchmark for Beacon.
//!
//! Registers a session on a running server, attaches clients to it, and
//! measures how many relayed payloads the clients receive per second.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_ADDR: &str = "127.0.0.1:8080";
const SESSION_KEY: &str = "e2e-bench";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let addr = args.get(2).cloned().unwrap_or_else(|| SERVER_ADDR.to_string());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           Beacon End-to-End Relay Benchmark                  ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Make sure the server is running: cargo run --release        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let session_url = match register(&addr).await {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Registration failed: {}", e);
            return;
        }
    };
    println!("✓ Registered session at {}", session_url);

    run_relay_benchmark(&addr, &session_url, num_clients).await;
}

/// Register the benchmark session and return its session path.
async fn register(addr: &str) -> Result<String, BoxError> {
    let body = serde_json::json!({
        "beacon": { "uuid": SESSION_KEY, "mac": "00:00:00:00:00:00", "name": "bench" }
    });

    let envelope: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{}/find/", addr))
        .json(&body)
        .send()
        .await?
        .json()
        .await?;
    if envelope["error"].as_bool().unwrap_or(true) {
        return Err(format!("Server refused registration: {}", envelope["message"]).into());
    }

    envelope["record"]["session_url"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "Response has no session_url".into())
}

async fn run_relay_benchmark(addr: &str, session_url: &str, num_clients: usize) {
    println!("📊 Relay Benchmark: {} clients", num_clients);
    println!("   Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let url = format!("ws://{}{}", addr, session_url);
    let message_count = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    // Spawn client tasks
    for client_id in 0..num_clients {
        let url = url.clone();
        let msg_count = Arc::clone(&message_count);
        let barrier = Arc::clone(&barrier);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(&url, msg_count, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    // Wait for all clients to connect
    barrier.wait().await;
    println!("✓ All {} clients connected", num_clients);

    // Warmup phase
    println!("⏳ Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    // Reset counter and start measurement
    message_count.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("📈 Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total_messages = message_count.load(Ordering::SeqCst);

    let msgs_per_sec = total_messages as f64 / elapsed.as_secs_f64();
    let msgs_per_sec_per_client = msgs_per_sec / num_clients as f64;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Clients:              {:>10}                           ║",
        num_clients
    );
    println!(
        "║  Duration:             {:>10.2}s                          ║",
        elapsed.as_secs_f64()
    );
    println!(
        "║  Total Received:       {:>10}                           ║",
        total_messages
    );
    println!(
        "║  Throughput:           {:>10.0} msg/s                    ║",
        msgs_per_sec
    );
    println!(
        "║  Per-Client:           {:>10.0} msg/s                    ║",
        msgs_per_sec_per_client
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    // Signal clients to stop
    for handle in handles {
        handle.abort();
    }
}

async fn run_client(
    url: &str,
    message_count: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), BoxError> {
    let (ws, _) = connect_async(url).await?;
    let (mut sender, mut receiver) = ws.split();

    // Wait for all clients to be ready
    barrier.wait().await;

    let publish_msg = Message::Binary(vec![0u8; 64]);

    // Slow readers are dropped by the hub, so keep reading on its own task
    let recv_count = message_count.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Binary(_) | Message::Text(_)) {
                recv_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    loop {
        if sender.send(publish_msg.clone()).await.is_err() {
            break;
        }
        // Small yield to not starve the receiver task
        tokio::task::yield_now().await;
    }

    recv_task.abort();
    Ok(())
}
