use clap::Parser;
use tracing_subscriber::EnvFilter;

use habit_app::{run, AppConfig, Cli};

fn main() {
    let cli = Cli::parse();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid environment: {err:#}");
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(habit_app::config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    if let Err(err) = run(cli, config, &mut stdout) {
        eprintln!("weekly-habits: {err:#}");
        std::process::exit(1);
    }
}
