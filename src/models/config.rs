use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::core::pagination::DEFAULT_PER_PAGE;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("缺少环境变量: {0}")]
    Missing(&'static str),

    #[error("环境变量 {name} 的值无效: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("不支持的密码哈希算法: {0}")]
    UnsupportedHash(String),
}

/// 密码哈希方案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    Argon2,
}

impl FromStr for PasswordScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(PasswordScheme::Argon2),
            other => Err(ConfigError::UnsupportedHash(other.to_string())),
        }
    }
}

/// 应用配置，来自进程环境（可由 `.env` 文件预先填充）
#[derive(Debug, Clone)]
pub struct Config {
    /// 数据库连接串
    pub database_url: String,
    /// 会话签名密钥
    pub secret_key: String,
    /// 密码 HMAC 盐
    pub password_salt: String,
    /// 密码哈希方案
    pub password_scheme: PasswordScheme,
    /// 上传图片目录
    pub upload_folder: PathBuf,
    /// 静态文件根目录
    pub static_dir: PathBuf,
    /// 博客路由挂载前缀
    pub blog_prefix: String,
    /// 列表每页文章数
    pub per_page: u32,
    /// 监听地址
    pub bind_addr: SocketAddr,
    /// 调试模式
    pub debug: bool,
    /// 会话有效期（小时）
    pub session_ttl_hours: i64,
}

impl Config {
    /// 读取 `.env` 后从进程环境加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("SQLALCHEMY_DATABASE_URI")
            .or_else(|| get("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://blog.db".to_string());
        let secret_key = get("SECRET_KEY").ok_or(ConfigError::Missing("SECRET_KEY"))?;
        let password_salt =
            get("SECURITY_PASSWORD_SALT").ok_or(ConfigError::Missing("SECURITY_PASSWORD_SALT"))?;
        let password_scheme = get("SECURITY_PASSWORD_HASH")
            .map(|v| v.parse::<PasswordScheme>())
            .transpose()?
            .unwrap_or(PasswordScheme::Argon2);

        let static_dir = PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "static".to_string()));
        let upload_folder = get("UPLOAD_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| static_dir.join("uploads"));

        let blog_prefix = get("BLOG_URL_PREFIX").unwrap_or_else(|| "/blog".to_string());
        let blog_prefix = format!("/{}", blog_prefix.trim_matches('/'));

        let per_page = parse_var("POSTS_PER_PAGE", get("POSTS_PER_PAGE"), DEFAULT_PER_PAGE)?;
        if per_page == 0 {
            return Err(ConfigError::Invalid {
                name: "POSTS_PER_PAGE",
                value: "0".to_string(),
            });
        }
        let bind_addr = parse_var(
            "BIND_ADDR",
            get("BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 5000)),
        )?;
        let debug = get("DEBUG").map(|v| truthy(&v)).unwrap_or(false);
        let session_ttl_hours = parse_var("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), 24i64)?;

        Ok(Config {
            database_url,
            secret_key,
            password_salt,
            password_scheme,
            upload_folder,
            static_dir,
            blog_prefix,
            per_page,
            bind_addr,
            debug,
            session_ttl_hours,
        })
    }
}

/// `1`、`true`、`yes`、`on`（不区分大小写）视为开启
pub fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_var<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}
