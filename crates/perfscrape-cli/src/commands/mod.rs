pub mod scrape;
pub mod serve;
pub mod snapshot;
pub mod tasks;
pub mod watch;

use std::path::{Path, PathBuf};

use log::debug;
use perfscrape_core::{ProviderConfig, ScrapeConfig, Scraper};

use crate::GlobalOpts;

/// Resolve the effective config: file (if any), then command-line overrides.
pub fn load_config(opts: &GlobalOpts) -> ScrapeConfig {
    let mut config = match &opts.config {
        Some(path) => match ScrapeConfig::from_json_file(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                std::process::exit(1);
            }
        },
        None => ScrapeConfig::default(),
    };

    if let Some(list) = &opts.collectors {
        config.collectors = ScrapeConfig::parse_collector_list(list);
    }
    if let Some(secs) = opts.timeout_sec {
        config.timeout_secs = secs;
    }

    let provider = opts.provider.as_deref().or(if opts.snapshot_file.is_some() {
        Some("static")
    } else {
        None
    });
    match provider {
        Some("static") => {
            let Some(path) = &opts.snapshot_file else {
                eprintln!("--provider static requires --snapshot-file");
                std::process::exit(1);
            };
            config.provider = ProviderConfig::Static {
                path: PathBuf::from(path),
            };
        }
        Some(_) => {
            config.provider = ProviderConfig::Procfs {
                root: opts.root.as_ref().map(PathBuf::from),
            };
        }
        None => {
            if let (Some(root), ProviderConfig::Procfs { root: current }) =
                (&opts.root, &mut config.provider)
            {
                *current = Some(PathBuf::from(root));
            }
        }
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }
    debug!(
        "effective config: timeout {}s, margin {}s, collectors [{}], provider {:?}",
        config.timeout_secs,
        config.timeout_margin_secs,
        config.collectors.join(", "),
        config.provider
    );
    config
}

/// Build a scraper for the effective config, exiting on error.
pub fn make_scraper(config: &ScrapeConfig) -> Scraper {
    match Scraper::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
