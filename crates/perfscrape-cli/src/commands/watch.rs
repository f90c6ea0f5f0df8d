use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::GlobalOpts;

pub fn run(opts: &GlobalOpts, interval_secs: f64, count: Option<u64>) {
    let interval = match Duration::try_from_secs_f64(interval_secs) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            eprintln!("--interval must be a positive number of seconds");
            std::process::exit(1);
        }
    };
    let config = super::load_config(opts);
    let scraper = super::make_scraper(&config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!(
        "Watching {} via {} every {interval_secs}s (deadline {:.1}s). Ctrl+C to stop.",
        scraper.task_names().join(", "),
        scraper.provider_name(),
        config.timeout_secs
    );

    let mut n = 0u64;
    while running.load(Ordering::SeqCst) && count.is_none_or(|c| n < c) {
        let started = Instant::now();
        match scraper.scrape() {
            Ok(report) => {
                let mut line = format!("[{n:>4}] {}", report.summary());
                for name in report.failed() {
                    let err = report.tasks[name].error.as_deref().unwrap_or("");
                    line.push_str(&format!("  {name}: {err}"));
                }
                println!("{line}");
            }
            Err(e) => eprintln!("[{n:>4}] scrape failed: {e}"),
        }
        n += 1;

        // sleep in small steps so Ctrl+C is noticed promptly
        while running.load(Ordering::SeqCst) && started.elapsed() < interval {
            std::thread::sleep(Duration::from_millis(50).min(interval));
        }
    }
    println!("Stopped after {n} scrape(s).");
}
