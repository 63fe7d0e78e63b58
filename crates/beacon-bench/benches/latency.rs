//! Latency benchmarks for Beacon.
//!
//! These benchmarks measure the time from a peer writing a payload to
//! another peer in the same session reading it.

use beacon_core::{Hub, HubConfig, HubHandle};
use beacon_transport::memory::{pair, MemoryPeer};
use beacon_transport::Adapter;
use criterion::{criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

fn attach(hub: &HubHandle) -> MemoryPeer {
    let (conn, peer) = pair(1024);
    tokio::spawn(Adapter::new(hub.clone(), 1024).run(conn));
    peer
}

async fn settle(hub: &HubHandle, members: usize) {
    while hub.member_count().await.unwrap() != members {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Benchmark one payload relayed through two adapters.
fn bench_relay_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("relay_latency");

    group.bench_function("two_peers", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let hub = Hub::spawn("latency", HubConfig::default());
                let sender = attach(&hub);
                let mut receiver = attach(&hub);
                settle(&hub, 2).await;

                let start = Instant::now();
                for _ in 0..iters {
                    sender.send(vec![0u8; 64]).await.unwrap();
                    receiver.recv().await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("ten_peers", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let hub = Hub::spawn("latency", HubConfig::default());
                let sender = attach(&hub);
                let mut receivers: Vec<_> = (0..9).map(|_| attach(&hub)).collect();
                settle(&hub, 10).await;

                let start = Instant::now();
                for _ in 0..iters {
                    sender.send(vec![0u8; 64]).await.unwrap();
                    for receiver in &mut receivers {
                        receiver.recv().await.unwrap();
                    }
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_relay_latency);
criterion_main!(benches);
