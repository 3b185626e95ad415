use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use novelfetch::cli::{Cli, Command};
use novelfetch::config::Config;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("load config")?;

    novelfetch::logging::init(&config.log_level).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command.unwrap_or(Command::Shell) {
        Command::Fetch(args) => {
            novelfetch::fetch::run(args, &config).context("fetch")?;
        }
        Command::Merge(args) => {
            novelfetch::merge::run(args).context("merge")?;
        }
        Command::Scan(args) => {
            novelfetch::scan::run(args).context("scan")?;
        }
        Command::Shell => {
            std::fs::create_dir_all(&config.download_path).with_context(|| {
                format!("create download dir: {}", config.download_path.display())
            })?;
            let fetcher =
                novelfetch::fetch::Fetcher::from_config(&config).context("build fetcher")?;
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            novelfetch::shell::run(&fetcher, stdin.lock(), stdout.lock()).context("shell")?;
        }
    }

    Ok(())
}

/// File, then `NOVELFETCH_*` env, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref().map(Path::new))?;
    if let Some(out) = &cli.out {
        config.download_path = PathBuf::from(out);
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.request_delay_ms = delay_ms;
    }
    if cli.no_progress {
        config.show_progress = false;
    }
    config.validate()?;
    Ok(config)
}
