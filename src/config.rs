// Configuration loading and parsing (auction.toml, credentials.toml).

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub auction: AuctionSettings,
    pub teams: Vec<TeamSeed>,
    pub ws_port: u16,
    pub db_path: String,
    pub data: DataPaths,
    pub bootstrap: BootstrapAdmin,
}

// ---------------------------------------------------------------------------
// auction.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire auction.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AuctionFile {
    auction: AuctionSettings,
    teams: Vec<TeamSeed>,
    websocket: WebsocketSection,
    database: DatabaseSection,
    data: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionSettings {
    /// League display name.
    pub name: String,
    /// Auction day, for the countdown on the overview page.
    #[serde(default)]
    pub auction_date: Option<NaiveDate>,
    /// Points every team starts with before retention costs.
    pub initial_purse: u32,
    /// Roster positions per team, filled by retention or purchase.
    pub slot_cap: u32,
}

impl AuctionSettings {
    /// Whole days until auction day, clamped at zero. `None` when no date
    /// is configured.
    pub fn days_to_go(&self, today: NaiveDate) -> Option<i64> {
        self.auction_date
            .map(|date| date.signed_duration_since(today).num_days().max(0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamSeed {
    pub name: String,
    pub captain: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// CSV sheet the bulk-import job reads player rows from.
    pub players: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

/// First-run Super Admin account. Loaded from `config/credentials.toml`
/// when present; otherwise the documented defaults apply (change the
/// password after first login).
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub full_name: String,
    pub username: String,
    pub password: String,
}

impl Default for BootstrapAdmin {
    fn default() -> Self {
        BootstrapAdmin {
            full_name: "Super Admin".to_string(),
            username: "superadmin".to_string(),
            password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    bootstrap: Option<BootstrapAdmin>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/auction.toml` and
/// (optionally) `config/credentials.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization
/// automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- auction.toml (required) ---
    let auction_path = config_dir.join("auction.toml");
    let auction_text = read_file(&auction_path)?;
    let auction_file: AuctionFile =
        toml::from_str(&auction_text).map_err(|e| ConfigError::ParseError {
            path: auction_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let bootstrap = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        let cred_file: CredentialsFile =
            toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
                path: credentials_path.clone(),
                source: e,
            })?;
        cred_file.bootstrap.unwrap_or_default()
    } else {
        BootstrapAdmin::default()
    };

    let config = Config {
        auction: auction_file.auction,
        teams: auction_file.teams,
        ws_port: auction_file.websocket.port,
        db_path: auction_file.database.path,
        data: auction_file.data,
        bootstrap,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        // If config/ also doesn't exist, the app will fail to load config.
        // Return an error with a clear message about the missing defaults
        // directory.
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        // Skip non-files and entries without a file name
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // Skip .example template files
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // File already exists in config/, skip it
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working
/// directory. Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.auction.initial_purse == 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.initial_purse".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.auction.slot_cap == 0 {
        return Err(ConfigError::ValidationError {
            field: "auction.slot_cap".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.teams.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "teams".into(),
            message: "at least one team must be configured".into(),
        });
    }

    for (idx, team) in config.teams.iter().enumerate() {
        if team.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{idx}].name"),
                message: "must not be empty".into(),
            });
        }
        if team.captain.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{idx}].captain"),
                message: "must not be empty".into(),
            });
        }
    }

    let mut names: Vec<&str> = config.teams.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != config.teams.len() {
        return Err(ConfigError::ValidationError {
            field: "teams".into(),
            message: "team names must be unique".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
