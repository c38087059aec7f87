use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_KEY_ENV: &str = "LOCKBOX_SECRET_KEY";
pub const BIND_ENV: &str = "LOCKBOX_BIND";

/// Service configuration loaded from `~/.config/lockbox/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for data directory (account collection).
    pub data_dir: Option<PathBuf>,
    /// Directory served for static assets.
    pub public_dir: Option<PathBuf>,
    pub server: Option<ServerConfig>,
    /// Where the credential key is loaded from.
    pub secret: Option<SecretConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SecretConfig {
    Env {
        env_var: Option<String>,
    },
    File {
        path: PathBuf,
    },
    Keyring {
        service: Option<String>,
        account: Option<String>,
    },
}

impl Default for SecretConfig {
    fn default() -> Self {
        SecretConfig::Env { env_var: None }
    }
}

impl Config {
    /// Config written by `lockbox config init`.
    pub fn starter() -> Self {
        Self {
            data_dir: None,
            public_dir: Some(PathBuf::from("public")),
            server: Some(ServerConfig {
                bind: Some(DEFAULT_BIND.to_string()),
            }),
            secret: Some(SecretConfig::Env {
                env_var: Some(DEFAULT_KEY_ENV.to_string()),
            }),
        }
    }

    pub fn public_dir(&self) -> PathBuf {
        self.public_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("public"))
    }

    pub fn secret(&self) -> SecretConfig {
        self.secret.clone().unwrap_or_default()
    }

    /// Bind address: `LOCKBOX_BIND`, then `[server] bind`, then the default.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let from_env = std::env::var(BIND_ENV).ok();
        self.bind_addr_with(from_env.as_deref())
    }

    fn bind_addr_with(&self, env_override: Option<&str>) -> Result<SocketAddr> {
        let raw = env_override
            .map(str::to_string)
            .or_else(|| self.server.as_ref().and_then(|s| s.bind.clone()))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        raw.parse()
            .map_err(|e| color_eyre::eyre::eyre!("invalid bind address {raw:?}: {e}"))
    }
}

/// Load config from the override or default path; if missing, return defaults.
pub fn load(path_override: Option<&Path>) -> Result<Config> {
    match path_override {
        Some(path) => load_from_path(path),
        None => load_from_path(default_path()?),
    }
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("lockbox").join("config.toml"))
}

/// Write the given config to `path`, creating parent directories as needed.
/// An existing file is left untouched to avoid clobbering user edits.
pub fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.secret(), SecretConfig::Env { env_var: None });
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/lockbox-data"
            public_dir = "/srv/lockbox/public"
            [server]
            bind = "0.0.0.0:8080"
            [secret]
            source = "file"
            path = "/etc/lockbox/key"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/tmp/lockbox-data")),
                public_dir: Some(PathBuf::from("/srv/lockbox/public")),
                server: Some(ServerConfig {
                    bind: Some("0.0.0.0:8080".into()),
                }),
                secret: Some(SecretConfig::File {
                    path: PathBuf::from("/etc/lockbox/key"),
                }),
            }
        );
    }

    #[test]
    fn parses_keyring_secret() {
        let cfg: Config = toml::from_str(
            r#"
            [secret]
            source = "keyring"
            service = "lockbox"
            account = "credential-key"
        "#,
        )
        .expect("parse");
        assert_eq!(
            cfg.secret(),
            SecretConfig::Keyring {
                service: Some("lockbox".into()),
                account: Some("credential-key".into()),
            }
        );
    }

    #[test]
    fn bind_address_precedence() {
        let mut cfg = Config::default();
        assert_eq!(
            cfg.bind_addr_with(None).expect("default"),
            DEFAULT_BIND.parse::<SocketAddr>().expect("addr")
        );

        cfg.server = Some(ServerConfig {
            bind: Some("0.0.0.0:8080".into()),
        });
        assert_eq!(cfg.bind_addr_with(None).expect("config").port(), 8080);
        assert_eq!(
            cfg.bind_addr_with(Some("127.0.0.1:9000")).expect("env").port(),
            9000
        );
        assert!(cfg.bind_addr_with(Some("not-an-address")).is_err());
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config::starter();

        write_if_missing(&cfg, &path).expect("write should succeed");
        fs::write(&path, "data_dir = \"/kept\"\n").expect("user edit");
        let second = write_if_missing(&cfg, &path).expect("second write ok");
        assert_eq!(second, path);

        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded.data_dir, Some(PathBuf::from("/kept")));
    }

    #[test]
    fn starter_config_round_trips_through_toml() {
        let body = toml::to_string_pretty(&Config::starter()).expect("serialize");
        let parsed: Config = toml::from_str(&body).expect("parse");
        assert_eq!(parsed, Config::starter());
    }
}
