use anyhow::Result;
use clap::Parser;
use gitbar::cli::CliArgs;
use gitbar::config::{Config, ConfigSource};
use gitbar::monitor::{self, Monitor};
use gitbar::logging;
use gitbar_core::WidgetOutput;
use std::io;
use std::process::ExitCode;
use tracing::{error, info};

/// Best effort; nothing else can be reported if stdout is gone.
fn print_error(prefix: &str, e: &anyhow::Error) {
    let output = WidgetOutput::error(prefix, format!("{:#}", e));
    let _ = monitor::emit(&mut io::stdout().lock(), &output);
}

fn load_config(args: &CliArgs) -> Result<(ConfigSource, Config, bool)> {
    let source = ConfigSource::from_cli(args)?;
    let (config, sample_written) = source.load_initial()?;
    Ok((source, config, sample_written))
}

async fn run(args: CliArgs, source: ConfigSource, config: Config) -> Result<()> {
    if args.once || args.list {
        let scanner = monitor::system_scanner(&config)?;
        // Blocking scan, still kept off the async workers
        return tokio::task::spawn_blocking(move || {
            let mut out = io::stdout().lock();
            if args.list {
                monitor::list_entries(&scanner, &config, &mut out)
            } else {
                monitor::run_once(&scanner, &config, &mut out)
            }
        })
        .await?;
    }

    let monitor = Monitor::new(
        &config,
        Some(source),
        Box::new(monitor::system_scanner),
        io::stdout(),
    )?;
    monitor::spawn_signal_handlers(monitor.handle())?;
    monitor.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let (source, config, sample_written) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = logging::init("info", None);
            error!("Configuration error: {:#}", e);
            print_error("Configuration error", &e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = logging::init(&config.logging.level, config.log_file().as_deref()) {
        let _ = logging::init(&config.logging.level, None);
        error!("Falling back to stderr logging: {:#}", e);
    }

    if sample_written {
        info!("Wrote sample configuration to {}", source.path.display());
    }
    info!("gitbar starting with {} repositories", config.repositories.len());

    match run(args, source, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            print_error("Fatal error", &e);
            ExitCode::from(1)
        }
    }
}
