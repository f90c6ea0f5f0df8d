use crate::GlobalOpts;

pub fn run(opts: &GlobalOpts, output: Option<&str>) {
    let config = super::load_config(opts);
    let scraper = super::make_scraper(&config);

    let snapshot = match scraper.provider().snapshot(&scraper.required_objects()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Snapshot failed: {e}");
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&snapshot) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Failed to encode snapshot: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => match std::fs::write(path, json + "\n") {
            Ok(()) => println!("Wrote {} object(s) to {path}", snapshot.objects.len()),
            Err(e) => {
                eprintln!("Failed to write {path}: {e}");
                std::process::exit(1);
            }
        },
        None => println!("{json}"),
    }
}
