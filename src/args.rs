//! These structs provide the CLI interface for the vouchers CLI.

use crate::vouchers::VoucherType;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// vouchers: Classify sevDesk bank transactions and book them as vouchers.
///
/// The program loads bank transactions, contacts, cost centres and accounting types from your
/// sevDesk account into a local cache. For a voucher type, e.g. donations or salaries, it selects
/// the matching open transactions, finds the contact and the cost centre for each one and writes a
/// plan that you can review. When you are happy with the plan, submit it to create and book the
/// vouchers in sevDesk.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. Create a sevDesk API token, save it to a file and
    /// pass that file as --api-key-file. It will be moved into the data directory. The directory
    /// is $HOME/vouchers unless you pass --home.
    Init(InitArgs),
    /// Reload the local cache from sevDesk. Everything in the cache is replaced.
    Refresh,
    /// Build the voucher plan for a voucher type and write it as a markdown report.
    Plan(PlanArgs),
    /// Build the voucher plan for a voucher type and create the vouchers in sevDesk.
    ///
    /// Without --yes this is a dry run that only writes the report.
    Submit(SubmitArgs),
    /// List the voucher types and the accounting types they book to.
    Types,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration, the cache and the reports are held. Defaults to
    /// ~/vouchers
    #[arg(long, env = "VOUCHER_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// Args for the `vouchers init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The path to a file that contains your sevDesk API token. This file will be moved to the
    /// default secrets location in the data directory.
    #[arg(long)]
    api_key_file: PathBuf,
}

impl InitArgs {
    pub fn new(api_key_file: impl Into<PathBuf>) -> Self {
        Self {
            api_key_file: api_key_file.into(),
        }
    }

    pub fn api_key_file(&self) -> &Path {
        &self.api_key_file
    }
}

/// Args for the `vouchers plan` command.
#[derive(Debug, Parser, Clone)]
pub struct PlanArgs {
    /// The voucher type to plan.
    #[arg(value_enum)]
    voucher_type: VoucherType,

    /// Include transactions that are already linked or booked.
    #[arg(long)]
    all_statuses: bool,

    /// Use the cached data instead of reloading it from sevDesk first.
    #[arg(long)]
    no_refresh: bool,
}

impl PlanArgs {
    pub fn new(voucher_type: VoucherType, all_statuses: bool, no_refresh: bool) -> Self {
        Self {
            voucher_type,
            all_statuses,
            no_refresh,
        }
    }

    pub fn voucher_type(&self) -> VoucherType {
        self.voucher_type
    }

    pub fn all_statuses(&self) -> bool {
        self.all_statuses
    }

    pub fn no_refresh(&self) -> bool {
        self.no_refresh
    }
}

/// Args for the `vouchers submit` command.
#[derive(Debug, Parser, Clone)]
pub struct SubmitArgs {
    /// The voucher type to submit.
    #[arg(value_enum)]
    voucher_type: VoucherType,

    /// Create the vouchers. Without this flag nothing is sent to sevDesk.
    #[arg(long)]
    yes: bool,

    /// Use the cached data instead of reloading it from sevDesk first.
    #[arg(long)]
    no_refresh: bool,
}

impl SubmitArgs {
    pub fn new(voucher_type: VoucherType, yes: bool, no_refresh: bool) -> Self {
        Self {
            voucher_type,
            yes,
            no_refresh,
        }
    }

    pub fn voucher_type(&self) -> VoucherType {
        self.voucher_type
    }

    pub fn yes(&self) -> bool {
        self.yes
    }

    pub fn no_refresh(&self) -> bool {
        self.no_refresh
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("vouchers"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or VOUCHER_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("vouchers")
        }
    })
}

/// A path that can be used as a clap default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
