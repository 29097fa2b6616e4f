use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(
    author,
    version,
    about = "subsentry - passive subdomain reconnaissance and liveness service",
    long_about = None,
    after_help = "EXAMPLES:
  Run the service:
    subsentry serve

  One-shot discovery scan:
    subsentry scan example.com

  Probe every known subdomain once:
    subsentry probe --limit 100"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the HTTP API with the scheduler and background engine")]
    Serve {
        /// Listen address override [default: env BIND_ADDR or 0.0.0.0:8000]
        #[arg(long)]
        bind: Option<String>,
    },

    #[command(about = "Run one discovery scan for an apex domain and exit")]
    Scan {
        /// Registrable apex domain (e.g. example.com)
        domain: String,
    },

    #[command(about = "Probe every known subdomain once and exit")]
    Probe {
        /// Cap the number of subdomains probed in this run
        #[arg(long)]
        limit: Option<i64>,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
