use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SLIDING_WINDOW_SIZE: u64 = 2; // In seconds

static STOP: AtomicBool = AtomicBool::new(false);

#[repr(C)]
#[derive(Default)]
struct WorkerStats {
    count: AtomicU64,
    /// Padding to avoid false sharing between worker counters.
    #[allow(dead_code)]
    padding: [u64; 15],
}

/// Runs `func` in a tight loop on all but one physical core and reports the
/// number of calls per second until Ctrl-C is pressed.
///
/// `on_tick` is called from the monitoring thread once per reporting window,
/// which lets callers drive collections concurrently with the workers.
pub fn test_throughput<F, C>(func: F, on_tick: C)
where
    F: Fn() + Sync + Send + 'static,
    C: Fn() + Send + 'static,
{
    ctrlc::set_handler(move || {
        STOP.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let num_threads = num_cpus::get_physical().max(2);
    println!("Number of threads: {}", num_threads);

    let func = Arc::new(func);
    let worker_stats: Arc<Vec<WorkerStats>> =
        Arc::new((0..num_threads).map(|_| WorkerStats::default()).collect());
    let mut handles = Vec::with_capacity(num_threads);

    let monitor_stats = Arc::clone(&worker_stats);
    handles.push(thread::spawn(move || {
        let mut start_time = Instant::now();
        let mut total_count_old: u64 = 0;
        while !STOP.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(500));
            let elapsed = start_time.elapsed();
            if elapsed.as_secs() < SLIDING_WINDOW_SIZE {
                continue;
            }
            on_tick();
            let total_count: u64 = monitor_stats
                .iter()
                .map(|stats| stats.count.load(Ordering::Relaxed))
                .sum();
            let throughput = (total_count - total_count_old) as f64 / elapsed.as_secs_f64();
            total_count_old = total_count;
            println!("Throughput: {:.2} iterations/sec", throughput);
            start_time = Instant::now();
        }
    }));

    for thread_index in 0..num_threads - 1 {
        let worker_stats = Arc::clone(&worker_stats);
        let func = Arc::clone(&func);
        handles.push(thread::spawn(move || {
            while !STOP.load(Ordering::SeqCst) {
                for _ in 0..1000 {
                    func();
                }
                worker_stats[thread_index]
                    .count
                    .fetch_add(1000, Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
