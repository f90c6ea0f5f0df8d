//! CLI for perfscrape: scrape, watch, and serve OS performance counters.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "perfscrape")]
#[command(about = "perfscrape: one snapshot, every collector, one deadline")]
#[command(version = perfscrape_core::VERSION)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand. Flags override the config file.
#[derive(Args)]
pub struct GlobalOpts {
    /// JSON config file (missing keys take defaults)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Snapshot provider
    #[arg(long, global = true, value_parser = ["procfs", "static"])]
    provider: Option<String>,

    /// procfs mount to read instead of /proc
    #[arg(long, global = true)]
    root: Option<String>,

    /// JSON snapshot to replay (implies --provider static)
    #[arg(long, global = true)]
    snapshot_file: Option<String>,

    /// Comma-separated collector list; "[defaults]" expands to the default set
    #[arg(long, global = true)]
    collectors: Option<String>,

    /// Global scrape deadline in seconds
    #[arg(long, global = true)]
    timeout_sec: Option<f64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in collectors and the snapshot objects they read
    Tasks,

    /// Dump the provider's snapshot for the enabled collectors as JSON
    Snapshot {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },

    /// Run one scrape and print the records
    Scrape {
        /// Output format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Restrict this scrape to a comma-separated subset of collectors
        #[arg(long)]
        only: Option<String>,
    },

    /// Scrape on a fixed interval until Ctrl+C, one summary line per scrape
    Watch {
        /// Seconds between scrape starts
        #[arg(long, default_value = "5")]
        interval: f64,

        /// Stop after this many scrapes
        #[arg(long)]
        count: Option<u64>,
    },

    /// Start the HTTP exposition server
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port
        #[arg(long, default_value = "9182")]
        port: u16,

        /// Concurrent scrapes allowed before answering 503
        #[arg(long, default_value_t = perfscrape_server::DEFAULT_MAX_REQUESTS)]
        max_requests: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Tasks => commands::tasks::run(&cli.global),
        Commands::Snapshot { output } => commands::snapshot::run(&cli.global, output.as_deref()),
        Commands::Scrape { format, only } => {
            commands::scrape::run(&cli.global, &format, only.as_deref())
        }
        Commands::Watch { interval, count } => commands::watch::run(&cli.global, interval, count),
        Commands::Serve {
            host,
            port,
            max_requests,
        } => commands::serve::run(&cli.global, &host, port, max_requests),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}
