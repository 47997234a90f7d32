use clap::Parser;
use imebot::config::{Settings, config_path};

/// Chat bot that converts phonetic input through an IME engine
#[derive(Parser)]
#[command(name = "imebot")]
#[command(version)]
#[command(about = "Chat bot that converts phonetic input through an IME engine")]
struct Cli {
    /// Log at debug level instead of info
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let path = config_path();
    let settings = match Settings::load(&path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = imebot::run(settings).await {
        log::error!(target: "imebot", "{}", e);
        std::process::exit(1);
    }
}
