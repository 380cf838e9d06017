use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::auth;
use crate::core::state::AppState;
use crate::utils::ensure_trailing_slash;
use crate::{admin, blog};

/// 上传请求体上限
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// HTTP 服务器
pub struct Server {
    /// 应用上下文
    state: AppState,
    /// 监听地址
    addr: SocketAddr,
}

impl Server {
    /// 创建新的服务器
    pub fn new(state: AppState) -> Self {
        let addr = state.config.bind_addr;
        Self { state, addr }
    }

    /// 组装所有路由
    pub fn router(state: AppState) -> Router {
        let prefix = state.config.blog_prefix.trim_end_matches('/').to_string();
        let static_dir = state.config.static_dir.clone();

        let mut app = Router::new()
            .route("/login", get(auth::login_form).post(auth::login))
            .route("/logout", get(auth::logout))
            .merge(admin::routes())
            .merge(blog::routes(&prefix))
            .nest_service("/static", ServeDir::new(static_dir));

        // 博客不在根路径时，根路径跳转到博客首页
        if !prefix.is_empty() {
            app = app.route("/", get(root_redirect));
        }

        app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// 启动服务器，Ctrl-C 后优雅退出并释放资源
    pub async fn start(self) -> Result<()> {
        let app = Self::router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("无法监听地址 {}", self.addr))?;
        info!(
            "Server started at http://{}{}",
            self.addr,
            ensure_trailing_slash(&self.state.config.blog_prefix)
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.shutdown().await;
        Ok(())
    }
}

async fn root_redirect(State(state): State<AppState>) -> Redirect {
    Redirect::to(&ensure_trailing_slash(&state.config.blog_prefix))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
