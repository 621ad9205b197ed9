use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DRIVE_FOLDER_PLACEHOLDER: &str = "YOUR_DRIVE_FOLDER_ID_HERE";
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotifierKind {
    #[serde(rename = "relay")]
    Relay,
    #[serde(rename = "stdout")]
    Stdout,
}

impl Default for NotifierKind {
    fn default() -> Self {
        NotifierKind::Relay
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub scan: ScanConfig,
    pub drive: DriveConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(with = "secs")]
    pub interval: Duration,
    pub default_recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub folder_id: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub notifier: NotifierKind,
    pub relay_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub from_name: String,
    pub from_address: String,
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

fn non_empty(value: std::result::Result<String, std::env::VarError>) -> Option<String> {
    value.ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let addr = std::env::var("SERVER_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let config = Config {
            server: ServerConfig {
                addr,
                upload_dir: std::env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./uploads")),
                max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
                environment: std::env::var("APP_ENV")
                    .unwrap_or_else(|_| "development".to_string()),
            },
            scan: ScanConfig {
                interval: Duration::from_secs(
                    std::env::var("POLLING_INTERVAL")
                        .ok()
                        .and_then(|s| s.parse::<u64>().ok())
                        .filter(|secs| *secs > 0)
                        .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS),
                ),
                default_recipient: std::env::var("DEFAULT_RECIPIENT_EMAIL")
                    .unwrap_or_else(|_| "test@example.com".to_string()),
            },
            drive: DriveConfig {
                folder_id: non_empty(std::env::var("DRIVE_FOLDER_ID"))
                    .filter(|id| id != DRIVE_FOLDER_PLACEHOLDER),
                access_token: non_empty(std::env::var("DRIVE_ACCESS_TOKEN")),
                api_base: std::env::var("DRIVE_API_BASE")
                    .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            },
            mail: MailConfig {
                notifier: match std::env::var("NOTIFIER")
                    .unwrap_or_else(|_| "relay".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "stdout" => NotifierKind::Stdout,
                    _ => NotifierKind::Relay,
                },
                relay_url: non_empty(std::env::var("MAIL_RELAY_URL")),
                api_key: non_empty(std::env::var("MAIL_API_KEY")),
                from_name: std::env::var("EMAIL_FROM_NAME")
                    .unwrap_or_else(|_| "Document Automation".to_string()),
                from_address: std::env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@example.com".to_string()),
            },
        };

        config.validate()?;

        if !config.drive_configured() {
            tracing::warn!("DRIVE_FOLDER_ID is not set. Remote persistence will fail every run.");
        }
        if !config.email_configured() {
            tracing::warn!("MAIL_RELAY_URL is not set. Notifications will fail every run.");
        }

        Ok(config)
    }

    /// Fails only on settings that prevent the process from starting.
    /// Remote location problems surface later as run failures.
    pub fn validate(&self) -> crate::Result<()> {
        self.server
            .addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                crate::Error::Config(format!("invalid SERVER_ADDR '{}': {}", self.server.addr, e))
            })?;

        url::Url::parse(&self.drive.api_base).map_err(|e| {
            crate::Error::Config(format!("invalid DRIVE_API_BASE '{}': {}", self.drive.api_base, e))
        })?;

        if let Some(relay) = &self.mail.relay_url {
            url::Url::parse(relay).map_err(|e| {
                crate::Error::Config(format!("invalid MAIL_RELAY_URL '{}': {}", relay, e))
            })?;
        }

        Ok(())
    }

    pub fn drive_configured(&self) -> bool {
        self.drive.folder_id.is_some()
    }

    pub fn email_configured(&self) -> bool {
        match self.mail.notifier {
            NotifierKind::Stdout => true,
            NotifierKind::Relay => self.mail.relay_url.is_some(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:5000".to_string(),
                upload_dir: PathBuf::from("./uploads"),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                environment: "development".to_string(),
            },
            scan: ScanConfig {
                interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
                default_recipient: "test@example.com".to_string(),
            },
            drive: DriveConfig {
                folder_id: None,
                access_token: None,
                api_base: "https://www.googleapis.com".to_string(),
            },
            mail: MailConfig {
                notifier: NotifierKind::Relay,
                relay_url: None,
                api_key: None,
                from_name: "Document Automation".to_string(),
                from_address: "noreply@example.com".to_string(),
            },
        }
    }
}
