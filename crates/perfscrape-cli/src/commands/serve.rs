use std::sync::Arc;

use crate::GlobalOpts;

pub fn run(opts: &GlobalOpts, host: &str, port: u16, max_requests: usize) {
    let config = super::load_config(opts);
    let scraper = Arc::new(super::make_scraper(&config));

    let base = format!("http://{host}:{port}");
    println!("perfscrape server v{}", perfscrape_core::VERSION);
    println!("   {base}");
    println!(
        "   provider {}, collectors: {}",
        scraper.provider_name(),
        scraper.task_names().join(", ")
    );
    println!(
        "   deadline {:.1}s (margin {:.1}s off the scraper's timeout header), {max_requests} concurrent scrape(s)",
        config.timeout_secs, config.timeout_margin_secs
    );
    println!();
    println!("   Endpoints:");
    println!("     GET /                 API index");
    println!("     GET /metrics          Prometheus text; collect[]=<name> filters");
    println!("     GET /health           Last scrape summary");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(perfscrape_server::run_server(
        scraper,
        config,
        host,
        port,
        max_requests,
    )) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
