use clap::{Arg, Command};
use log::LevelFilter;
use score_gate::server;
use score_gate::Config;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("score-gate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scoring API gateway with declarative request validation")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/score-gate.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .value_name("ADDR")
                .help("Override the configured listen address")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logger based on verbose flag
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if let Some(listen) = matches.get_one::<String>("listen") {
        config.listen = listen.clone();
    }

    if matches.get_flag("test-config") {
        match config.listen.parse::<std::net::SocketAddr>() {
            Ok(addr) => {
                println!("Configuration OK");
                println!("  listen: {addr}");
                println!(
                    "  store: {}:{} ({} retries, {}ms backoff)",
                    config.store.host,
                    config.store.port,
                    config.store.retry_counts,
                    config.store.retry_backoff_ms
                );
            }
            Err(e) => {
                eprintln!("Invalid listen address '{}': {e}", config.listen);
                process::exit(1);
            }
        }
        return;
    }

    log::info!("Starting score-gate at {}", config.listen);
    if let Err(e) = server::run(config).await {
        log::error!("Server error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
