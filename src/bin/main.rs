use clap::Parser;
use eoka_harvest::{Config, ConsolePrompt, HarvestResult, Harvester};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-harvest")]
#[command(about = "Harvest every comment of a post")]
#[command(version)]
struct Cli {
    /// Config file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Result file (overrides config)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Keep avatar URLs but skip downloading the images
    #[arg(long)]
    no_avatars: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> eoka_harvest::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    // credentials usually live in .env
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let params = eoka_harvest::Params::from_args(&cli.params)?;
    let mut config = Config::load_with_params(&cli.config, &params)?;

    if cli.headless {
        config.browser.headless = true;
    }
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if cli.no_avatars {
        config.avatars.enabled = false;
    }

    if cli.check {
        println!("Config valid: {}", cli.config.display());
        println!("  Account: {}", config.credentials.username);
        println!("  Target: {}", config.target.url);
        println!("  Login page: {}", config.login.url);
        println!("  Stable rounds: {}", config.comments.stable_rounds);
        match config.comments.max_duration_ms {
            Some(ms) => println!("  Scroll cap: {}s", ms / 1000),
            None => println!("  Scroll cap: none"),
        }
        if config.avatars.enabled {
            println!("  Avatars: {}", config.avatars.dir.display());
        } else {
            println!("  Avatars: off");
        }
        println!("  Output: {}", config.output.path.display());
        return Ok(());
    }

    println!("Harvesting: {}", config.target.url);

    let harvester = Harvester::new(&config.browser).await?;
    let outcome = harvest_and_save(&harvester, &config).await;
    let result = after_close(outcome, harvester.close()).await?;

    println!();
    if result.success {
        println!("✓ Success");
    } else {
        println!("✗ Failed");
        if let Some(ref error) = result.error {
            println!("  Error: {}", error);
        }
    }
    println!("  Comments: {}", result.comments.len());
    if result.rejected > 0 {
        println!("  Skipped: {} of {}", result.rejected, result.scanned);
    }
    if result.capped {
        println!("  Stopped at scroll cap");
    }
    println!("  Duration: {}ms", result.duration_ms);

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

async fn harvest_and_save(
    harvester: &Harvester,
    config: &Config,
) -> eoka_harvest::Result<HarvestResult> {
    let result = harvester.run(config, &ConsolePrompt).await?;
    if result.success {
        eoka_harvest::output::write_comments(&config.output.path, &result.comments)?;
    }
    Ok(result)
}

/// Run `close`, then hand back `outcome`. A close failure is only returned
/// when the outcome itself succeeded.
async fn after_close<T>(
    outcome: eoka_harvest::Result<T>,
    close: impl Future<Output = eoka_harvest::Result<()>>,
) -> eoka_harvest::Result<T> {
    let closed = close.await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!("Failed to close browser: {}", close_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoka_harvest::Error;
    use std::cell::Cell;

    #[tokio::test]
    async fn failed_run_still_closes() {
        let closed = Cell::new(false);
        let outcome: eoka_harvest::Result<()> = Err(Error::Driver("page crashed".into()));

        let err = after_close(outcome, async {
            closed.set(true);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(closed.get());
        assert!(err.to_string().contains("page crashed"));
    }

    #[tokio::test]
    async fn run_error_wins_over_close_error() {
        let outcome: eoka_harvest::Result<()> = Err(Error::Driver("page crashed".into()));

        let err = after_close(outcome, async { Err(Error::Driver("close failed".into())) })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("page crashed"));
    }

    #[tokio::test]
    async fn close_error_surfaces_after_success() {
        let err = after_close(Ok(3), async { Err(Error::Driver("close failed".into())) })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("close failed"));
    }
}
