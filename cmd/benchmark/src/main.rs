//! Scenario benchmark: scale-up, scale-down, and shutdown-during-load.
//!
//! Not a criterion microbenchmark (see `cqpool-backend/benches` for that) —
//! this is a narrative demo of the elasticity controller reacting to load.

use cqpool::{Pool, PoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    println!("=== cqpool Scenario Benchmark ===\n");

    let scenario = std::env::args().nth(1).unwrap_or_else(|| "all".into());

    if scenario == "all" || scenario == "scale-up" {
        scale_up();
    }
    if scenario == "all" || scenario == "scale-down" {
        scale_down();
    }
    if scenario == "all" || scenario == "shutdown" {
        shutdown_during_load();
    }

    println!("\n=== Benchmark Complete ===");
}

fn scale_up() {
    println!("--- Scenario: scale-up under saturation ---");

    let config = PoolConfig::default()
        .name("scale-up")
        .min_threads(1)
        .max_threads(8)
        .max_concurrency(8)
        .dispatch_timeout_ms(20);

    let pool = Pool::new(config, |_payload| {
        std::thread::sleep(Duration::from_millis(50));
    })
    .expect("pool construction");

    println!("starting threads: {}", pool.current_threads());

    for _ in 0..64 {
        pool.submit(Box::new([])).expect("submit");
    }

    let start = Instant::now();
    while pool.current_threads() < 8 && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(20));
    }

    println!("threads after saturation: {}", pool.current_threads());
    pool.shutdown();
    println!();
}

fn scale_down() {
    println!("--- Scenario: scale-down when idle ---");

    let config = PoolConfig::default()
        .name("scale-down")
        .min_threads(1)
        .max_threads(8)
        .max_concurrency(8)
        .max_idle_threads(1)
        .maint_period_ms(20);

    let pool = Pool::new(config, |_payload| {
        std::thread::sleep(Duration::from_millis(10));
    })
    .expect("pool construction");

    for _ in 0..64 {
        pool.submit(Box::new([])).expect("submit");
    }

    std::thread::sleep(Duration::from_millis(200));
    println!("threads under load: {}", pool.current_threads());

    let start = Instant::now();
    while pool.current_threads() > 1 && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(50));
    }

    println!("threads after idling down: {}", pool.current_threads());
    pool.shutdown();
    println!();
}

fn shutdown_during_load() {
    println!("--- Scenario: shutdown while submissions are in flight ---");

    let config = PoolConfig::default()
        .name("shutdown-load")
        .min_threads(2)
        .max_threads(4)
        .max_concurrency(4);

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_cb = Arc::clone(&completed);

    let pool = Pool::new(config, move |_payload| {
        std::thread::sleep(Duration::from_millis(5));
        completed_cb.fetch_add(1, Ordering::Relaxed);
    })
    .expect("pool construction");

    for _ in 0..32 {
        let _ = pool.submit(Box::new([]));
    }

    println!("shutting down mid-flight...");
    pool.shutdown();

    println!(
        "completed before drain finished: {}",
        completed.load(Ordering::Relaxed)
    );
    println!(
        "rejected after shutdown: {}",
        pool.submit(Box::new([])).is_err()
    );
    println!();
}
