use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::core::auth::{CurrentUser, Viewer};
use crate::core::error::{AppError, AppResult};
use crate::core::forms::PostForm;
use crate::core::pagination::parse_page;
use crate::core::state::AppState;
use crate::models::{Post, PostChanges, Tag};
use crate::theme::renderer::page_context;
use crate::utils::{ensure_trailing_slash, slug_url};

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub q: Option<String>,
    /// 原样接收，非数字时回退到第 1 页
    pub page: Option<String>,
}

/// 标签名称用逗号拼接，填入编辑表单
pub(crate) fn joined_names(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 文章列表，支持 `q` 搜索与 `page` 分页
pub async fn index(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Query(query): Query<IndexQuery>,
) -> AppResult<Html<String>> {
    let page = parse_page(query.page.as_deref());
    let q = query.q.unwrap_or_default();

    let pages = state
        .repo
        .list_posts(Some(q.as_str()), page, state.config.per_page)
        .await?;
    debug!("Listing page {} of {} ({} posts)", pages.page, pages.pages, pages.total);

    let mut context = page_context(viewer.as_ref());
    context.insert("page_numbers", &pages.iter_pages().collect::<Vec<_>>());
    context.insert("pages", &pages);
    context.insert("q", &q);
    state.render("posts/index.html", &context)
}

/// 文章详情
pub async fn post_detail(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let post = state
        .repo
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let tags = state.repo.post_tags(post.id).await?;

    let mut context = page_context(viewer.as_ref());
    context.insert("post", &post);
    context.insert("tags", &tags);
    state.render("posts/post_detail.html", &context)
}

/// 某个标签下的所有文章
pub async fn tag_detail(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let tag = state
        .repo
        .find_tag_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let posts = state.repo.tag_posts(tag.id).await?;

    let mut context = page_context(viewer.as_ref());
    context.insert("tag", &tag);
    context.insert("posts", &posts);
    state.render("posts/tag_detail.html", &context)
}

pub async fn create_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let context = page_context(Some(&user));
    state.render("posts/create_post.html", &context)
}

/// 新建文章
///
/// 请求中必须带有 `file` 字段；扩展名不被允许的文件会被忽略，文章照常创建。
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    if !form.has_file_part {
        return Err(AppError::NoFilePart);
    }

    let image = match form.selected_file() {
        Some(file) => state.uploads.save_new(file).await?,
        None => None,
    };

    let post = Post::new(
        form.title.clone().unwrap_or_default(),
        form.body.clone().unwrap_or_default(),
    )
    .with_image(image);
    let tags = form.tags.clone().unwrap_or_default();

    match state.repo.create_post(post, &tags).await {
        Ok(post) => {
            info!("{} created post {}", user.email, post.slug);
            Ok(Redirect::to(&ensure_trailing_slash(&state.config.blog_prefix)).into_response())
        }
        Err(e) => {
            error!("Something went wrong: {:#}", e);
            Err(AppError::CreateFailed)
        }
    }
}

pub async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let post = state
        .repo
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let tags = state.repo.post_tags(post.id).await?;

    let mut context = page_context(Some(&user));
    context.insert("post", &post);
    context.insert("tag_names", &joined_names(&tags));
    state.render("posts/edit_post.html", &context)
}

/// 保存编辑；上传了有效的新图片时替换并删除旧图片
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = state
        .repo
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let form = PostForm::from_multipart(multipart).await?;

    let image = match form.selected_file() {
        Some(file) => state.uploads.replace(post.image.as_deref(), file).await?,
        None => None,
    };

    let changes = PostChanges {
        title: form.title,
        body: form.body,
        tags: form.tags,
        image,
    };
    let post = state.repo.update_post(post, changes).await?;
    info!("{} edited post {}", user.email, post.slug);

    Ok(Redirect::to(&slug_url(&state.config.blog_prefix, &post.slug)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_names_are_comma_joined() {
        let tags = vec![Tag::new("rust"), Tag::new("web dev")];
        assert_eq!(joined_names(&tags), "rust, web dev");
        assert_eq!(joined_names(&[]), "");
    }
}
