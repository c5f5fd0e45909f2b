use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mysql://localhost:3306/batch".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

impl DatabaseConfig {
    /// 从JSON凭据文件构造配置，其余连接池参数使用默认值
    pub fn from_credentials_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let credentials = DatabaseCredentials::from_file(path)?;
        Ok(Self {
            url: credentials.to_url()?,
            ..Self::default()
        })
    }

    /// Validate database configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }

        if !self.url.starts_with("mysql://")
            && !self.url.starts_with("mariadb://")
            && !self.url.starts_with("sqlite:")
        {
            return Err(anyhow::anyhow!("数据库URL必须是MySQL或SQLite格式"));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        if self.min_connections > self.max_connections {
            return Err(anyhow::anyhow!("最小连接数不能大于最大连接数"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }
}

/// Credentials file as mounted into the batch service pods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub db: String,
    pub password: String,
}

impl DatabaseCredentials {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取数据库凭据文件失败: {}", path.display()))?;
        serde_json::from_str(content.trim()).context("解析数据库凭据失败")
    }

    /// Build a `mysql://` URL; user and password are percent-encoded.
    pub fn to_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&format!("mysql://{}", self.host))
            .with_context(|| format!("无效的数据库主机: {}", self.host))?;
        url.set_port(Some(self.port))
            .map_err(|_| anyhow::anyhow!("无法设置数据库端口"))?;
        url.set_username(&self.user)
            .map_err(|_| anyhow::anyhow!("无法设置数据库用户名"))?;
        url.set_password(Some(&self.password))
            .map_err(|_| anyhow::anyhow!("无法设置数据库密码"))?;
        url.set_path(&self.db);
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DatabaseConfig {
            url: "postgres://localhost/batch".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            min_connections: 20,
            max_connections: 5,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_credentials_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"host": "db.internal", "port": 3306, "user": "batch", "db": "batchdb", "password": "p@ss/word"}}"#
        )
        .unwrap();

        let config = DatabaseConfig::from_credentials_file(file.path()).unwrap();
        assert!(config.url.starts_with("mysql://batch:"));
        assert!(config.url.ends_with("@db.internal:3306/batchdb"));
        assert!(!config.url.contains("p@ss/word"));
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_missing_credentials_file() {
        assert!(DatabaseCredentials::from_file("/nonexistent/sql-config.json").is_err());
    }
}
