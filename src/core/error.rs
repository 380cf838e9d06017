use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use thiserror::Error;
use tracing::error;

/// 请求处理过程中的错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error("页面不存在")]
    NotFound,

    #[error("No file part")]
    NoFilePart,

    #[error("Error while creating post")]
    CreateFailed,

    #[error("需要登录: {next}")]
    Unauthorized { next: String },

    #[error("请求无效: {0}")]
    BadRequest(String),

    #[error("模板错误: {0}")]
    Template(#[from] tera::Error),

    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

const NOT_FOUND_PAGE: &str = include_str!("../../templates/404.html");

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
            AppError::NoFilePart | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            AppError::CreateFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AppError::Unauthorized { next } => {
                let target = format!(
                    "/login?next={}",
                    url::form_urlencoded::byte_serialize(next.as_bytes()).collect::<String>()
                );
                let mut response = Redirect::to(&target).into_response();
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
                response
            }
            other => {
                error!("Request failed: {}", other);
                let mut source = std::error::Error::source(&other);
                while let Some(e) = source {
                    error!("Caused by: {}", e);
                    source = e.source();
                }
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
