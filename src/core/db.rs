use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// 建表语句，按顺序执行，可重复运行
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS post (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(140) NOT NULL,
        slug VARCHAR(140) NOT NULL UNIQUE,
        body TEXT NOT NULL DEFAULT '',
        created TEXT NOT NULL,
        image VARCHAR(120)
    )",
    "CREATE TABLE IF NOT EXISTS article (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(140) NOT NULL,
        slug VARCHAR(140) NOT NULL UNIQUE,
        body TEXT NOT NULL DEFAULT '',
        created TEXT NOT NULL
    )",
    // 标签别名没有唯一约束
    "CREATE TABLE IF NOT EXISTS tag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(100) NOT NULL,
        slug VARCHAR(100) NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS tag_slug_idx ON tag (slug)",
    "CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email VARCHAR(100) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS role (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(100) NOT NULL UNIQUE,
        description VARCHAR(255)
    )",
    "CREATE TABLE IF NOT EXISTS post_tags (
        post_id INTEGER NOT NULL REFERENCES post(id),
        tag_id INTEGER NOT NULL REFERENCES tag(id)
    )",
    "CREATE TABLE IF NOT EXISTS articles_tags (
        article_id INTEGER NOT NULL REFERENCES article(id),
        tag_id INTEGER NOT NULL REFERENCES tag(id)
    )",
    "CREATE TABLE IF NOT EXISTS roles_users (
        user_id INTEGER NOT NULL REFERENCES user(id),
        role_id INTEGER NOT NULL REFERENCES role(id)
    )",
];

/// 数据库连接池
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 连接数据库，文件不存在时自动创建
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("无效的数据库连接串: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // 内存数据库每个连接都是独立的库，只能保留唯一的长连接
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("连接数据库失败: {}", url))?;

        info!("Connected to database {}", url);
        Ok(Self { pool })
    }

    /// 创建缺失的表
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("执行建表语句失败: {}", statement))?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
