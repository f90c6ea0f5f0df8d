use log::warn;
use perfscrape_core::all_tasks;

use crate::GlobalOpts;

pub fn run(opts: &GlobalOpts) {
    let config = super::load_config(opts);
    let tasks = all_tasks();
    let defaults: Vec<&str> = tasks
        .iter()
        .filter(|t| t.info().default_enabled)
        .map(|t| t.name())
        .collect();
    let enabled = config.expand_collectors(&defaults);

    println!("{:<10} {:<8} {:<24} DESCRIPTION", "NAME", "ENABLED", "OBJECTS");
    for task in &tasks {
        let info = task.info();
        let on = enabled.iter().any(|n| n == info.name);
        println!(
            "{:<10} {:<8} {:<24} {}",
            info.name,
            if on { "yes" } else { "no" },
            info.objects.join(", "),
            info.description
        );
    }

    for name in &enabled {
        if !tasks.iter().any(|t| t.name() == name.as_str()) {
            warn!("unknown collector {name:?} in configuration");
        }
    }
}
