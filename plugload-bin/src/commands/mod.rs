mod inspect;
mod run;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use plugload_config::{ConfigLoader, PlugloadConfig};
use plugload_core::{PlugloadError, Result};
use tracing::debug;

/// plugload: load, inspect and unload a plugin tree the way a native host would
#[derive(Parser)]
#[command(name = "plugload", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to plugload.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize every plugin under the plugin root, list them, shut down
    Run {
        /// Plugin root (overrides plugins.root)
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the module scopes of a plugin root or plugin directory without activating anything
    Inspect {
        /// Plugin root, its Managed directory, or a single plugin directory
        dir: PathBuf,
        /// Dependency names to resolve in every scope
        #[arg(short = 'd', long = "resolve")]
        resolve: Vec<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let residence = plugload_bootstrap::resident::residence()?;
        let loaded = ConfigLoader::load(self.config.as_deref(), &residence)?;
        let config_path = loaded.path().to_path_buf();
        let config = loaded.into_config();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_logging(log_level, &config.logging.format);
        debug!(config = %config_path.display(), residence = %residence.display(), "configuration loaded");

        match self.command {
            Commands::Run { root, json } => run::cmd_run(self.config, residence, root, json),
            Commands::Inspect { dir, resolve, json } => {
                inspect::cmd_inspect(&config, &dir, &resolve, json)
            }
            Commands::Config { json } => Self::cmd_config(&config, &config_path, json),
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: &PlugloadConfig, path: &std::path::Path, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| PlugloadError::Config(e.to_string()))?;
            println!("# {}", path.display());
            println!("{rendered}");
        }
        Ok(())
    }

    fn cmd_version() -> Result<()> {
        let runtime = plugload_core::RuntimeInfo::current();
        println!("plugload v{}", runtime.loader_version);
        println!("   Contract: v{}", plugload_contract::CONTRACT_VERSION);
        println!("   OS: {:?}", runtime.os);
        println!("   Arch: {:?} ({}-bit)", runtime.arch, runtime.pointer_width);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "plugload", &mut std::io::stdout());
        Ok(())
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().init(),
        _ => builder.with_target(false).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_globals() {
        let cli = Cli::try_parse_from(["plugload", "run", "--root", "/tmp/plugins", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { root, json } => {
                assert_eq!(root, Some(PathBuf::from("/tmp/plugins")));
                assert!(json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn parses_inspect_with_repeated_resolve() {
        let cli = Cli::try_parse_from(["plugload", "inspect", "Managed/Greeter", "-d", "greeter", "-d", "zlib"])
            .unwrap();
        match cli.command {
            Commands::Inspect { dir, resolve, json } => {
                assert_eq!(dir, PathBuf::from("Managed/Greeter"));
                assert_eq!(resolve, vec!["greeter", "zlib"]);
                assert!(!json);
            }
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["plugload", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
