use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `WATCHSTORE_LOG=debug`.
pub const LOG_ENV: &str = "WATCHSTORE_LOG";

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format for releases: "v0.4.2"
/// Format for dev builds: "v0.4.2\ndev: abc1234 2024-01-15 14:30"
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" {
            format!("v{}", VERSION)
        } else {
            format!("v{}\ndev: {} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "watchstore",
    bin_name = "watchstore",
    version = get_version(),
    disable_help_subcommand = true
)]
#[command(about = "Inspect, migrate, import and export watchstore user stores", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to $WATCHSTORE_DATA or the OS data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate an exported blob to the current schema and print it
    Migrate {
        /// JSON file to migrate
        file: PathBuf,

        /// Print the migration report instead of the data
        #[arg(long)]
        report: bool,
    },

    /// Load a blob (any version) into a user's store
    Import {
        #[arg(short, long)]
        user: String,

        /// JSON file to import
        file: PathBuf,
    },

    /// Print a user's store as a v1.3 blob
    Export {
        #[arg(short, long)]
        user: String,
    },

    /// Show schema version and collection sizes
    Status {
        #[arg(short, long)]
        user: String,
    },

    /// List the physical keys of a user's store
    Keys {
        #[arg(short, long)]
        user: String,
    },

    /// Remove every key of a user's store
    Clear {
        #[arg(short, long)]
        user: String,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Install the stderr log subscriber. `WATCHSTORE_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "watchstore=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from(["watchstore", "import", "--user", "42", "blob.json"]).unwrap();
        match cli.command {
            Commands::Import { user, file } => {
                assert_eq!(user, "42");
                assert_eq!(file, PathBuf::from("blob.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_data_flag_is_global() {
        let cli =
            Cli::try_parse_from(["watchstore", "keys", "-u", "1", "--data", "/tmp/x"]).unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_user_is_required() {
        assert!(Cli::try_parse_from(["watchstore", "export"]).is_err());
    }
}
