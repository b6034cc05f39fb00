//! Gateway configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` by default) and
//! deserializes it into [`GatewayConfig`]. Falls back to defaults when the
//! file is missing or malformed. There is no built-in signing secret: absent
//! one, a random key is generated once and kept in the data directory.

use std::path::{Path, PathBuf};

use parley_types::config::GatewayConfig;

/// Environment variable that relocates the data directory.
pub const DATA_DIR_ENV: &str = "PARLEY_DATA_DIR";

/// Environment variable that overrides `jwt_secret`.
pub const JWT_SECRET_ENV: &str = "PARLEY_JWT_SECRET";

/// `$PARLEY_DATA_DIR`, falling back to `~/.parley`.
pub fn resolve_data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".parley")
        })
}

/// File in the data directory holding the generated signing key.
pub const JWT_KEY_FILE: &str = "jwt.key";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GatewayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - `PARLEY_JWT_SECRET`, when set and non-empty, replaces `jwt_secret`.
/// - With no secret configured, the key in `{data_dir}/jwt.key` is used,
///   generated on first run.
pub async fn load_gateway_config(data_dir: &Path) -> std::io::Result<GatewayConfig> {
    let mut config = read_config_file(data_dir).await;
    apply_secret_override(&mut config, std::env::var(JWT_SECRET_ENV).ok());
    if config.jwt_secret.trim().is_empty() {
        config.jwt_secret = load_or_create_jwt_key(data_dir).await?;
    }
    Ok(config)
}

/// Read `{data_dir}/jwt.key`, creating it with 32 random bytes (hex) if absent.
pub async fn load_or_create_jwt_key(data_dir: &Path) -> std::io::Result<String> {
    let key_path = data_dir.join(JWT_KEY_FILE);

    match tokio::fs::read_to_string(&key_path).await {
        Ok(key) if !key.trim().is_empty() => return Ok(key.trim().to_string()),
        Ok(_) => {
            tracing::warn!("{} is empty, generating a new signing key", key_path.display());
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let bytes: [u8; 32] = rand::random();
    let key: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    tokio::fs::write(&key_path, &key).await?;
    restrict_permissions(&key_path).await?;
    tracing::info!("Generated token signing key at {}", key_path.display());
    Ok(key)
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn read_config_file(data_dir: &Path) -> GatewayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
    };

    match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GatewayConfig::default()
        }
    }
}

fn apply_secret_override(config: &mut GatewayConfig, secret: Option<String>) {
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        config.jwt_secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.port, 3000);
        assert_eq!(config.history_max_limit, 200);
    }

    #[tokio::test]
    async fn read_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
port = 9100
max_content_len = 280
admin_users = ["ops"]
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.port, 9100);
        assert_eq!(config.max_content_len, 280);
        assert_eq!(config.admin_users, ["ops"]);
        assert_eq!(config.outbound_buffer, 256);
    }

    #[tokio::test]
    async fn read_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.port, 3000);
    }

    #[tokio::test]
    async fn missing_secret_generates_a_persistent_key() {
        let tmp = TempDir::new().unwrap();
        let first = load_or_create_jwt_key(tmp.path()).await.unwrap();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let second = load_or_create_jwt_key(tmp.path()).await.unwrap();
        assert_eq!(first, second);

        let other = TempDir::new().unwrap();
        assert_ne!(load_or_create_jwt_key(other.path()).await.unwrap(), first);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        load_or_create_jwt_key(tmp.path()).await.unwrap();
        let meta = tokio::fs::metadata(tmp.path().join(JWT_KEY_FILE)).await.unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn configured_secret_skips_key_file() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "jwt_secret = \"from-file\"\n")
            .await
            .unwrap();

        let config = load_gateway_config(tmp.path()).await.unwrap();
        if std::env::var(JWT_SECRET_ENV).is_err() {
            assert_eq!(config.jwt_secret, "from-file");
        }
        assert!(!tmp.path().join(JWT_KEY_FILE).exists());
    }

    #[test]
    fn secret_override_ignores_empty_values() {
        let mut config = GatewayConfig::default();
        apply_secret_override(&mut config, Some(String::new()));
        assert!(config.jwt_secret.is_empty());

        apply_secret_override(&mut config, Some("from-env".into()));
        assert_eq!(config.jwt_secret, "from-env");
    }
}
