pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::core::state::AppState;

/// 管理后台路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::index))
        .route("/admin/", get(handlers::index))
        .route("/admin/post/", get(handlers::post_list))
        .route("/admin/post/new/", get(handlers::post_new_form).post(handlers::post_create))
        .route("/admin/post/edit/:id", get(handlers::post_edit_form).post(handlers::post_update))
        .route("/admin/post/delete/:id", post(handlers::post_delete))
        .route("/admin/article/", get(handlers::article_list))
        .route("/admin/article/new/", get(handlers::article_new_form).post(handlers::article_create))
        .route("/admin/article/edit/:id", get(handlers::article_edit_form).post(handlers::article_update))
        .route("/admin/article/delete/:id", post(handlers::article_delete))
        .route("/admin/tag/", get(handlers::tag_list))
        .route("/admin/tag/new/", get(handlers::tag_new_form).post(handlers::tag_create))
        .route("/admin/tag/edit/:id", get(handlers::tag_edit_form).post(handlers::tag_update))
        .route("/admin/tag/delete/:id", post(handlers::tag_delete))
}
