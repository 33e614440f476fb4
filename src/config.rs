//! Configuration file handling.
//!
//! The configuration file is stored at `$VOUCHER_HOME/config.json` and contains the sevDesk API
//! URL, the voucher numbering prefix, request pacing, and the resolver settings of every voucher
//! type. The home directory also holds the api key, the classification rules, the SQLite cache and
//! the generated plan reports.

use crate::db::Db;
use crate::error::Res;
use crate::rules::DEFAULT_RULES_CSV;
use crate::utils;
use crate::vouchers::{VoucherType, VoucherTypeSettings};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const APP_NAME: &str = "vouchers";
const CONFIG_VERSION: u8 = 1;
const DEFAULT_API_URL: &str = "https://my.sevdesk.de/api/v1";
const DEFAULT_NUMBER_PREFIX: &str = "B";
const DEFAULT_REQUEST_INTERVAL_MS: u64 = 100;
const SECRETS: &str = ".secrets";
const REPORTS: &str = ".reports";
const API_KEY: &str = "api_key";
const RULES_CSV: &str = "rules.csv";
const CONFIG_JSON: &str = "config.json";
const VOUCHERS_SQLITE: &str = "vouchers.sqlite";

/// Takes precedence over the api key file.
pub const API_KEY_ENV: &str = "SEVDESK_API_KEY";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$VOUCHER_HOME` and from there it loads `$VOUCHER_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    reports: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the home directory, its subdirectories and:
    /// - an initial `config.json` with default settings
    /// - `rules.csv` with the built-in donation rules
    /// - the SQLite cache
    ///
    /// `api_key_file` is moved to `.secrets/api_key`.
    pub async fn create(dir: impl Into<PathBuf>, api_key_file: &Path) -> Res<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let reports = root.join(REPORTS);
        utils::make_dir(&reports).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        utils::rename(api_key_file, secrets.join(API_KEY)).await?;

        let rules_path = root.join(RULES_CSV);
        if rules_path.exists() {
            debug!("Keeping the existing rules at {}", rules_path.display());
        } else {
            utils::write(&rules_path, DEFAULT_RULES_CSV).await?;
        }

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;
        let api_url = config_file.api_url()?;

        let sqlite_path = root.join(VOUCHERS_SQLITE);
        let db = Db::open(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            reports,
            secrets,
            config_path,
            config_file,
            api_url,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load the config file
    /// - validate that the reports and secrets directories exist
    /// - open the SQLite cache
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The home directory is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = config_file.api_url()?;

        let reports = root.join(REPORTS);
        if !reports.is_dir() {
            bail!("The reports directory is missing '{}'", reports.display())
        }
        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        let sqlite_path = root.join(VOUCHERS_SQLITE);
        let db = Db::open(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            reports,
            secrets,
            config_path,
            config_file,
            api_url,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn reports(&self) -> &Path {
        &self.reports
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn number_prefix(&self) -> &str {
        &self.config_file.number_prefix
    }

    /// The minimum time between two requests to the API.
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.config_file.request_interval_ms)
    }

    /// Returns the stored `rules_path` if it is absolute, otherwise resolves the relative path.
    pub fn rules_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.rules_path())
    }

    /// Returns the stored `api_key_path` if it is absolute, otherwise resolves the relative path.
    pub fn api_key_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.api_key_path())
    }

    /// The sevDesk API token. `SEVDESK_API_KEY` takes precedence over the api key file.
    pub async fn api_key(&self) -> Res<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        let path = self.api_key_path();
        let key = utils::read(&path)
            .await
            .context("Unable to read the api key")?
            .trim()
            .to_string();
        ensure!(!key.is_empty(), "The api key file '{}' is empty", path.display());
        Ok(key)
    }

    /// The resolver settings for `voucher_type`. Types missing from `config.json` use the built-in
    /// settings.
    pub fn voucher_settings(&self, voucher_type: VoucherType) -> VoucherTypeSettings {
        self.config_file
            .voucher_types
            .get(&voucher_type)
            .cloned()
            .unwrap_or_else(|| voucher_type.default_settings())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "vouchers",
///   "config_version": 1,
///   "api_url": "https://my.sevdesk.de/api/v1",
///   "number_prefix": "B",
///   "request_interval_ms": 100,
///   "voucher_types": {
///     "spenden": { "preferred_category": "2" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "vouchers"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the sevDesk API
    #[serde(default = "default_api_url")]
    api_url: String,

    /// The prefix of voucher reference numbers, e.g. `B` for `B-2025-17`
    #[serde(default = "default_number_prefix")]
    number_prefix: String,

    /// Minimum milliseconds between two API requests
    #[serde(default = "default_request_interval_ms")]
    request_interval_ms: u64,

    /// Path to the classification rules (optional, relative to the home directory or absolute)
    /// Defaults to $VOUCHER_HOME/rules.csv if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rules_path: Option<PathBuf>,

    /// Path to the api key file (optional, relative to the home directory or absolute)
    /// Defaults to $VOUCHER_HOME/.secrets/api_key if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key_path: Option<PathBuf>,

    /// Resolver settings per voucher type
    #[serde(default)]
    voucher_types: BTreeMap<VoucherType, VoucherTypeSettings>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_number_prefix() -> String {
    DEFAULT_NUMBER_PREFIX.to_string()
}

fn default_request_interval_ms() -> u64 {
    DEFAULT_REQUEST_INTERVAL_MS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: default_api_url(),
            number_prefix: default_number_prefix(),
            request_interval_ms: DEFAULT_REQUEST_INTERVAL_MS,
            rules_path: None,
            api_key_path: None,
            voucher_types: VoucherType::all_default_settings(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from `path` and validates it.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            !config.number_prefix.trim().is_empty(),
            "The number_prefix in {} must not be empty",
            path.display()
        );
        let _ = config.api_url()?;

        Ok(config)
    }

    /// Saves the ConfigFile to `path`.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Parses and validates `api_url`.
    fn api_url(&self) -> Res<Url> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid api_url '{}'", self.api_url))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "The api_url '{}' must be an http or https URL",
            self.api_url
        );
        Ok(url)
    }

    fn rules_path(&self) -> PathBuf {
        self.rules_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(RULES_CSV))
    }

    fn api_key_path(&self) -> PathBuf {
        self.api_key_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(API_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_key_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("key.txt");
        utils::write(&path, "  0123456789abcdef\n").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("voucher_home");
        let key_file = make_key_file(&dir).await;

        let config = Config::create(&home, &key_file).await.unwrap();

        assert!(config.reports().is_dir());
        assert!(config.secrets().is_dir());
        assert!(config.sqlite_path().is_file());
        assert!(!key_file.exists());
        assert_eq!(config.api_url().as_str(), "https://my.sevdesk.de/api/v1");
        assert_eq!(config.number_prefix(), "B");
        assert_eq!(config.request_interval(), Duration::from_millis(100));
        assert_eq!(config.rules_path(), config.root().join("rules.csv"));
        assert_eq!(
            utils::read(&config.rules_path()).await.unwrap(),
            DEFAULT_RULES_CSV
        );
        assert_eq!(
            config.api_key_path(),
            config.root().join(".secrets").join("api_key")
        );
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let key_file = make_key_file(&dir).await;
        let created = Config::create(&home, &key_file).await.unwrap();
        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(created.config_file, loaded.config_file);
        assert_eq!(created.root(), loaded.root());
    }

    #[tokio::test]
    async fn test_config_create_keeps_existing_rules() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        utils::make_dir(&home).await.unwrap();
        utils::write(home.join("rules.csv"), "kind,bucket\n").await.unwrap();
        let key_file = make_key_file(&dir).await;
        let config = Config::create(&home, &key_file).await.unwrap();
        assert_eq!(
            utils::read(&config.rules_path()).await.unwrap(),
            "kind,bucket\n"
        );
    }

    #[tokio::test]
    async fn test_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let e = Config::load(dir.path()).await.unwrap_err();
        assert!(e.to_string().contains("config file is missing"));
    }

    #[tokio::test]
    async fn test_api_key_from_file() {
        let dir = TempDir::new().unwrap();
        let key_file = make_key_file(&dir).await;
        let config = Config::create(dir.path().join("home"), &key_file)
            .await
            .unwrap();
        // The environment variable would take precedence.
        if std::env::var(API_KEY_ENV).is_err() {
            assert_eq!(config.api_key().await.unwrap(), "0123456789abcdef");
        }
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        utils::write(&path, r#"{"app_name": "vouchers", "config_version": 1}"#)
            .await
            .unwrap();
        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.number_prefix, "B");
        assert_eq!(config.request_interval_ms, 100);
        assert!(config.voucher_types.is_empty());
        assert_eq!(config.rules_path(), PathBuf::from(RULES_CSV));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        utils::write(&path, r#"{"app_name": "ledger", "config_version": 1}"#)
            .await
            .unwrap();
        let e = ConfigFile::load(&path).await.unwrap_err();
        assert!(e.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_api_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        utils::write(
            &path,
            r#"{"app_name": "vouchers", "config_version": 1, "api_url": "ftp://example.com"}"#,
        )
        .await
        .unwrap();
        assert!(ConfigFile::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut original = ConfigFile::default();
        original.number_prefix = "V".to_string();
        original.rules_path = Some(PathBuf::from("/etc/vouchers/rules.csv"));
        original.save(&path).await.unwrap();
        let loaded = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("rules_path"));
        assert!(!json.contains("api_key_path"));
        assert!(json.contains("\"gehalt\""));
    }

    #[tokio::test]
    async fn test_voucher_settings_fall_back_to_builtin() {
        let dir = TempDir::new().unwrap();
        let key_file = make_key_file(&dir).await;
        let mut config = Config::create(dir.path().join("home"), &key_file)
            .await
            .unwrap();
        config.config_file.voucher_types.clear();
        let settings = config.voucher_settings(VoucherType::Gehalt);
        assert_eq!(settings, VoucherType::Gehalt.default_settings());
        assert_eq!(settings.preferred_category.as_deref(), Some("3"));
    }
}
