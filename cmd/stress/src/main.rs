//! Stress test - many submissions under a small, elastic pool.
//!
//! Exercises scale-up under saturation and measures throughput.

use cqpool::{Pool, PoolConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn main() {
    println!("=== cqpool Stress Test ===\n");

    let num_items: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    println!("Submitting {} items...", num_items);

    let config = PoolConfig::default()
        .name("stress")
        .min_threads(2)
        .max_threads(16)
        .max_concurrency(16)
        .max_idle_threads(2);

    let completed = Arc::new(AtomicU64::new(0));
    let completed_cb = Arc::clone(&completed);

    let pool = Pool::new(config, move |_payload| {
        std::thread::yield_now();
        completed_cb.fetch_add(1, Ordering::Relaxed);
    })
    .expect("pool construction");

    let start = Instant::now();

    for i in 0..num_items {
        pool.submit(Box::new([])).expect("submit");

        if (i + 1) % 1000 == 0 {
            print!("\rSubmitted: {}/{}", i + 1, num_items);
        }
    }

    let submit_time = start.elapsed();
    println!("\n\nSubmit time: {:?}", submit_time);
    println!(
        "Submit rate: {:.0} items/sec",
        num_items as f64 / submit_time.as_secs_f64()
    );

    println!("\nWaiting for completion...");
    let run_start = Instant::now();

    loop {
        let done = completed.load(Ordering::Relaxed) as usize;
        if done >= num_items {
            break;
        }

        if run_start.elapsed().as_secs() > 30 {
            println!("Timeout! Only {}/{} completed", done, num_items);
            break;
        }

        print!(
            "\rCompleted: {}/{} (threads: {})",
            done,
            num_items,
            pool.current_threads()
        );
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    let total_time = start.elapsed();
    let run_time = run_start.elapsed();

    println!("\n\n=== Results ===");
    println!("Total items:  {}", num_items);
    println!("Completed:    {}", completed.load(Ordering::Relaxed));
    println!("Peak threads: {}", pool.current_threads());
    println!("Submit time:  {:?}", submit_time);
    println!("Run time:     {:?}", run_time);
    println!("Total time:   {:?}", total_time);
    println!(
        "Throughput:   {:.0} items/sec",
        num_items as f64 / total_time.as_secs_f64()
    );

    pool.shutdown();
    println!("\n=== Stress Test Complete ===");
}
