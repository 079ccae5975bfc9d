use automatix_lib::commands::schedule;
use automatix_lib::commands::update::Updater;
use automatix_lib::config::{CONFIG_FILE_NAME, Config, ConfigError, EXAMPLE_CONFIG_FILE_NAME};
use automatix_lib::error::display_chain;
use automatix_lib::infrastructure::{FsError, GithubClient, GithubError, ShellRunner, fs};
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Top-level error type for the automatix binary
#[derive(Debug, Error)]
enum AutomatixError {
    /// No configuration file exists, an example was written instead.
    #[error("configuration file {} does not exist, example written to {}", config.display(), example.display())]
    ConfigMissing { config: PathBuf, example: PathBuf },

    /// The configuration could not be loaded or the example not written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The repository base directory could not be prepared.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// The Github client could not be initialized.
    #[error(transparent)]
    Github(#[from] GithubError),
}

#[derive(Parser)]
#[command(name = "automatix")]
#[command(about = "Keep the Go module dependencies of Github repositories up to date", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output, including the output of executed commands
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Where to write an example configuration if the configuration file is missing
    #[arg(long, value_name = "FILE", default_value = EXAMPLE_CONFIG_FILE_NAME)]
    example_config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(AutomatixError::ConfigMissing { config, example }) => {
            info!("config file {} does not exist", config.display());
            info!("written example config file to {}", example.display());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", display_chain(&e));
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every repository of the final cycle was processed successfully.
///
/// # Errors
///
/// Returns [`AutomatixError::ConfigMissing`] after writing the example configuration.
/// Returns [`AutomatixError::Config`] if the configuration cannot be loaded.
/// Returns [`AutomatixError::Fs`] if the repository base directory cannot be created.
/// Returns [`AutomatixError::Github`] if the Github client cannot be created.
fn run(cli: &Cli) -> Result<bool, AutomatixError> {
    if !fs::is_file(&cli.config) {
        Config::write_example(&cli.example_config)?;
        return Err(AutomatixError::ConfigMissing {
            config: cli.config.clone(),
            example: cli.example_config.clone(),
        });
    }

    let config = Config::load(&cli.config)?;
    info!(
        "configuration loaded from {}, configuration:\n{config}",
        cli.config.display()
    );

    let base_dir = fs::ensure_dir(&config.repo_base_dir)?;

    let token = config.token();
    if token.is_none() {
        warn!("no Github token configured, Github requests will fail");
    }

    let gateway = GithubClient::with_api_base(config.api_url(), token.clone())?;
    let updater = Updater::new(gateway, ShellRunner, token.unwrap_or_default());
    let targets = config.targets(&base_dir);

    Ok(schedule::run(&updater, &targets, config.schedule()))
}

/// Initialize logging based on the verbosity level specified in the CLI
fn init_logging(cli: &Cli) {
    let mut builder = env_logger::builder();
    builder
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(|buf, record| {
            let level = record.level();
            let style = &buf.default_level_style(level);
            writeln!(buf, "[{style}{level}{style:#}] {}", record.args())
        });

    if !cli.verbose {
        builder.format_timestamp(None);
    }

    builder.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_uses_default_file_names() {
        let cli = Cli::try_parse_from(["automatix"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE_NAME));
        assert_eq!(cli.example_config, PathBuf::from(EXAMPLE_CONFIG_FILE_NAME));
    }

    #[test]
    fn cli_accepts_custom_paths() {
        let cli =
            Cli::try_parse_from(["automatix", "-v", "--config", "/etc/automatix.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("/etc/automatix.toml"));
    }

    #[test]
    fn missing_config_writes_example_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            verbose: false,
            config: dir.path().join(CONFIG_FILE_NAME),
            example_config: dir.path().join(EXAMPLE_CONFIG_FILE_NAME),
        };

        let err = run(&cli).unwrap_err();

        assert!(matches!(err, AutomatixError::ConfigMissing { .. }));
        assert!(Config::load(&cli.example_config).is_ok());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config, "repositories = 3").unwrap();
        let cli = Cli {
            verbose: false,
            config,
            example_config: dir.path().join(EXAMPLE_CONFIG_FILE_NAME),
        };

        assert!(matches!(run(&cli), Err(AutomatixError::Config(_))));
        assert!(!cli.example_config.exists());
    }

    #[test]
    fn config_without_repositories_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(CONFIG_FILE_NAME);
        let repos = dir.path().join("repos");
        std::fs::write(
            &config,
            format!(
                "repo_base_dir = {:?}\ngithub_token = \"t\"\n",
                repos.to_string_lossy()
            ),
        )
        .unwrap();
        let cli = Cli {
            verbose: false,
            config,
            example_config: dir.path().join(EXAMPLE_CONFIG_FILE_NAME),
        };

        assert!(run(&cli).unwrap());
        assert!(repos.is_dir());
    }
}
