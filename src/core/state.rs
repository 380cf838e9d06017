use std::sync::Arc;

use anyhow::Result;
use axum::response::Html;
use tracing::info;

use crate::core::auth::{Argon2Hasher, SessionSigner};
use crate::core::db::Database;
use crate::core::error::AppResult;
use crate::core::hooks::RegenerateSlug;
use crate::core::repository::Repository;
use crate::core::upload::UploadStore;
use crate::models::Config;
use crate::theme::renderer::ThemeRenderer;

/// 请求处理共享的应用上下文
///
/// 启动时通过 [`AppState::init`] 显式创建，退出前调用 [`AppState::shutdown`]。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Repository,
    pub renderer: Arc<ThemeRenderer>,
    pub uploads: UploadStore,
    pub hasher: Arc<Argon2Hasher>,
    pub sessions: Arc<SessionSigner>,
}

impl AppState {
    /// 连接数据库、建表并准备模板与认证服务
    pub async fn init(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database_url).await?;
        db.migrate().await?;
        Self::with_database(config, db)
    }

    /// 使用已准备好的数据库
    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let repo = Repository::new(db).with_hook(Arc::new(RegenerateSlug));
        let renderer = ThemeRenderer::new(&config.blog_prefix)?;
        let uploads = UploadStore::new(config.upload_folder.clone());
        let hasher = Argon2Hasher::new(config.password_salt.clone(), config.password_scheme);
        let sessions = SessionSigner::new(config.secret_key.clone(), config.session_ttl_hours);

        info!("Application state initialized");
        Ok(Self {
            config: Arc::new(config),
            repo,
            renderer: Arc::new(renderer),
            uploads,
            hasher: Arc::new(hasher),
            sessions: Arc::new(sessions),
        })
    }

    /// 渲染模板
    pub fn render(&self, template: &str, context: &tera::Context) -> AppResult<Html<String>> {
        Ok(Html(self.renderer.render(template, context)?))
    }

    /// 释放数据库连接
    pub async fn shutdown(&self) {
        self.repo.database().close().await;
        info!("Application state shut down");
    }
}
