use std::path::PathBuf;

use iroh::SecretKey;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::listing::MAX_PER_PAGE;

static DATA_DIR_NAME: &str = "blog_core";
static BLOG_DB_NAME: &str = "blog_db.sqlite";
static CONFIG_FILE_NAME: &str = "config.json";
static DATA_DIR_ENV: &str = "BLOG_DATA_DIR";

// data_dir_path (or $BLOG_DATA_DIR)
// |- blog_core
//    |- blog_db.sqlite
//    |- config.json

fn default_secret_key() -> SecretKey {
    SecretKey::generate(&mut rand::rng())
}

fn default_log_filter() -> String {
    "info,sea_orm=warn,sqlx=warn".to_string()
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_activation_ttl_hours() -> i64 {
    24
}

fn default_reset_ttl_minutes() -> i64 {
    60
}

fn default_per_page() -> u64 {
    10
}

fn default_contact_inbox() -> String {
    "contact@localhost".to_string()
}

/// Upper bound for session and activation lifetimes: one year.
const MAX_TTL_HOURS: i64 = 24 * 365;
/// Upper bound for reset links: one week.
const MAX_RESET_TTL_MINUTES: i64 = 60 * 24 * 7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no data directory available on this platform")]
    NoDataDir,
    #[error("config i/o failed")]
    Io(#[from] std::io::Error),
    #[error("config file is malformed")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Page sizes handed to the listing engine at construction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingConfig {
    /// Public listings.
    #[serde(default = "default_per_page")]
    pub per_page: u64,

    /// Dashboard listings (posts, comments, users, subscribers).
    #[serde(default = "default_per_page")]
    pub admin_per_page: u64,
}

impl ListingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("per_page", self.per_page), ("admin_per_page", self.admin_per_page)] {
            if value == 0 || value > MAX_PER_PAGE {
                return Err(ConfigError::Invalid(format!(
                    "listing.{name} must be between 1 and {MAX_PER_PAGE}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            admin_per_page: default_per_page(),
        }
    }
}

/// Token lifetimes for the account flows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    #[serde(default = "default_activation_ttl_hours")]
    pub activation_ttl_hours: i64,

    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("session_ttl_hours", self.session_ttl_hours, MAX_TTL_HOURS),
            ("activation_ttl_hours", self.activation_ttl_hours, MAX_TTL_HOURS),
            ("reset_ttl_minutes", self.reset_ttl_minutes, MAX_RESET_TTL_MINUTES),
        ];
        for (name, value, max) in checks {
            if !(1..=max).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "auth.{name} must be between 1 and {max}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            activation_ttl_hours: default_activation_ttl_hours(),
            reset_ttl_minutes: default_reset_ttl_minutes(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BlogConfig {
    /// Secret key for the local node/instance.
    #[serde(default = "default_secret_key")]
    pub(crate) secret_key: SecretKey,

    /// Secret key used for client-side identity/auth (separate from node secret).
    #[serde(default = "default_secret_key")]
    pub(crate) client_secret_key: SecretKey,

    pub(crate) database_path: PathBuf,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Where contact form messages are delivered.
    #[serde(default = "default_contact_inbox")]
    pub contact_inbox: String,
}

impl BlogConfig {
    /// Creates a new BlogConfig with generated secret keys and the specified data directory
    fn new(data_dir: PathBuf) -> Self {
        BlogConfig {
            secret_key: default_secret_key(),
            client_secret_key: default_secret_key(),
            database_path: data_dir.join(BLOG_DB_NAME),
            listing: ListingConfig::default(),
            auth: AuthConfig::default(),
            log_filter: default_log_filter(),
            contact_inbox: default_contact_inbox(),
        }
    }

    /// Rejects values that would break listings or token expiry math.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listing.validate()?;
        self.auth.validate()?;
        if !self.contact_inbox.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "contact_inbox `{}` is not an email address",
                self.contact_inbox
            )));
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path.display())
    }
}

fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir().ok_or(ConfigError::NoDataDir)
}

/// Gets the existing config or initializes a new one if it doesn't exist
pub async fn get_or_init() -> Result<BlogConfig, ConfigError> {
    let blog_dir = data_dir()?.join(DATA_DIR_NAME);
    let config_path = blog_dir.join(CONFIG_FILE_NAME);

    fs::create_dir_all(&blog_dir).await?;

    if fs::try_exists(&config_path).await? {
        let mut file = fs::File::open(&config_path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let config: BlogConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    } else {
        let config = BlogConfig::new(blog_dir.clone());

        let json = serde_json::to_string_pretty(&config)?;
        let mut file = fs::File::create(&config_path).await?;
        file.write_all(json.as_bytes()).await?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = BlogConfig::new(PathBuf::from("/tmp/blog"));
        let mut json: serde_json::Value = serde_json::to_value(&config).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.remove("listing");
        obj.remove("auth");
        obj.remove("log_filter");
        obj.remove("contact_inbox");

        let parsed: BlogConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.listing, ListingConfig::default());
        assert_eq!(parsed.auth.session_ttl_hours, 24);
        assert_eq!(parsed.auth.reset_ttl_minutes, 60);
        assert_eq!(parsed.contact_inbox, "contact@localhost");
        assert_eq!(parsed.database_path, PathBuf::from("/tmp/blog/blog_db.sqlite"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = BlogConfig::new(PathBuf::from("/tmp/blog"));
        assert!(config.validate().is_ok());

        config.listing.per_page = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.listing = ListingConfig::default();

        config.auth.session_ttl_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.auth = AuthConfig::default();

        config.auth.reset_ttl_minutes = -5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.auth = AuthConfig::default();

        config.contact_inbox = "nobody".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn database_url_creates_missing_file() {
        let config = BlogConfig::new(PathBuf::from("/srv/blog"));
        assert_eq!(
            config.database_url(),
            "sqlite:///srv/blog/blog_db.sqlite?mode=rwc"
        );
    }
}
