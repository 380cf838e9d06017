pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::core::state::AppState;
use crate::utils::{ensure_trailing_slash, join_url};

/// 博客页面路由
///
/// `prefix` 不带结尾斜杠，空串表示挂在根路径；首页同时响应带与不带斜杠的地址。
pub fn routes(prefix: &str) -> Router<AppState> {
    let index = get(handlers::index);
    let mut router = Router::new().route(&ensure_trailing_slash(prefix), index.clone());
    if !prefix.is_empty() {
        router = router.route(prefix, index);
    }

    router
        .route(
            &join_url(prefix, "/create"),
            get(handlers::create_form).post(handlers::create),
        )
        .route(&join_url(prefix, "/tag/:slug"), get(handlers::tag_detail))
        .route(&join_url(prefix, "/:slug"), get(handlers::post_detail))
        .route(
            &join_url(prefix, "/:slug/edit/"),
            get(handlers::edit_form).post(handlers::edit),
        )
}
