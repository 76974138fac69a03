//! Basic cqpool example
//!
//! Demonstrates constructing a pool, submitting a handful of work items,
//! and a clean shutdown.

use cqpool::{Pool, PoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn main() {
    println!("=== cqpool Basic Example ===\n");

    let config = PoolConfig::default()
        .name("basic")
        .min_threads(2)
        .max_threads(4)
        .max_concurrency(4);

    let completed = Arc::new(AtomicUsize::new(0));
    let total_items = 3;
    let completed_cb = Arc::clone(&completed);

    let pool = Pool::new(config, move |payload| {
        let label = payload
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        println!("[worker] processing {}", label);
        completed_cb.fetch_add(1, Ordering::SeqCst);
    })
    .expect("pool construction");

    println!("Submitting {} items...\n", total_items);
    for i in 0..total_items {
        let label = format!("item-{}", i);
        pool.submit(label.into_bytes().into_boxed_slice()).unwrap();
    }

    println!("\nWaiting for items to complete...");
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(5);

    while completed.load(Ordering::SeqCst) < total_items {
        if start.elapsed() > timeout {
            println!("WARNING: timeout waiting for items!");
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    println!(
        "\n{}/{} items completed ({} threads running)",
        completed.load(Ordering::SeqCst),
        total_items,
        pool.current_threads()
    );

    pool.shutdown();
    println!("\n=== Example Complete ===");
}
