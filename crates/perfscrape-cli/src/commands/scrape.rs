use log::debug;
use perfscrape_core::ScrapeConfig;
use perfscrape_server::encode_text;

use crate::GlobalOpts;

pub fn run(opts: &GlobalOpts, format: &str, only: Option<&str>) {
    let config = super::load_config(opts);
    let scraper = super::make_scraper(&config);
    let filter = only.map(ScrapeConfig::parse_collector_list);

    debug!(
        "scraping {} with a {:.3}s deadline",
        scraper.task_names().join(", "),
        config.timeout().as_secs_f64()
    );
    let report = match scraper.run_scrape_filtered(config.timeout(), filter.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Scrape failed: {e}");
            std::process::exit(1);
        }
    };

    match format {
        "json" => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to encode report: {e}");
                std::process::exit(1);
            }
        },
        _ => match encode_text(&report.records) {
            Ok(text) => {
                print!("{text}");
                eprintln!("# {}", report.summary());
            }
            Err(e) => {
                eprintln!("Failed to encode records: {e}");
                std::process::exit(1);
            }
        },
    }
}
