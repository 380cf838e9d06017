use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::blog::handlers::joined_names;
use crate::core::auth::CurrentUser;
use crate::core::error::{AppError, AppResult};
use crate::core::forms::{ArticleForm, PostForm, TagForm};
use crate::core::pagination::parse_page;
use crate::core::state::AppState;
use crate::models::{Article, ArticleChanges, Post, PostChanges, Tag};
use crate::theme::renderer::page_context;

/// 管理后台列表每页条数
const ADMIN_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
}

/// 首页上的一类数据
#[derive(Debug, Serialize)]
struct ModelEntry {
    path: &'static str,
    label: &'static str,
    count: u64,
}

fn back_to(path: &str) -> Response {
    Redirect::to(path).into_response()
}

pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let posts = state.repo.list_posts(None, 1, 1).await?.total;
    let articles = state.repo.list_articles(1, 1).await?.total;
    let tags = state.repo.list_tags().await?.len() as u64;

    let models = [
        ModelEntry { path: "post", label: "Post", count: posts },
        ModelEntry { path: "article", label: "Article", count: articles },
        ModelEntry { path: "tag", label: "Tag", count: tags },
    ];
    let mut context = page_context(Some(&user));
    context.insert("models", &models);
    state.render("admin/index.html", &context)
}

// ---------------------------------------------------------------
// Post
// ---------------------------------------------------------------

pub async fn post_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Html<String>> {
    let page = parse_page(query.page.as_deref());
    let pages = state.repo.list_posts(None, page, ADMIN_PAGE_SIZE).await?;

    let mut context = page_context(Some(&user));
    context.insert("pages", &pages);
    state.render("admin/post_list.html", &context)
}

pub async fn post_new_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let mut context = page_context(Some(&user));
    context.insert("post", &Option::<Post>::None);
    context.insert("tag_names", "");
    state.render("admin/post_form.html", &context)
}

pub async fn post_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    let image = match form.selected_file() {
        Some(file) => state.uploads.save_new(file).await?,
        None => None,
    };

    let post = Post::new(
        form.title.unwrap_or_default(),
        form.body.unwrap_or_default(),
    )
    .with_image(image);
    let post = state
        .repo
        .create_post(post, &form.tags.unwrap_or_default())
        .await?;
    info!("[admin] {} created post {}", user.email, post.slug);

    Ok(back_to("/admin/post/"))
}

pub async fn post_edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let post = state.repo.find_post(id).await?.ok_or(AppError::NotFound)?;
    let tags = state.repo.post_tags(post.id).await?;

    let mut context = page_context(Some(&user));
    context.insert("post", &post);
    context.insert("tag_names", &joined_names(&tags));
    state.render("admin/post_form.html", &context)
}

pub async fn post_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = state.repo.find_post(id).await?.ok_or(AppError::NotFound)?;
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
    info!("[admin] {} updated post {}", user.email, post.slug);

    Ok(back_to("/admin/post/"))
}

pub async fn post_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    if !state.repo.delete_post(id).await? {
        return Err(AppError::NotFound);
    }
    info!("[admin] {} deleted post {}", user.email, id);
    Ok(back_to("/admin/post/"))
}

// ---------------------------------------------------------------
// Article
// ---------------------------------------------------------------

pub async fn article_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Html<String>> {
    let page = parse_page(query.page.as_deref());
    let pages = state.repo.list_articles(page, ADMIN_PAGE_SIZE).await?;

    let mut context = page_context(Some(&user));
    context.insert("pages", &pages);
    state.render("admin/article_list.html", &context)
}

pub async fn article_new_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let mut context = page_context(Some(&user));
    context.insert("article", &Option::<Article>::None);
    context.insert("tag_names", "");
    state.render("admin/article_form.html", &context)
}

pub async fn article_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ArticleForm>,
) -> AppResult<Response> {
    let tags = form.tag_names();
    let article = state
        .repo
        .create_article(Article::new(form.title, form.body), &tags)
        .await?;
    info!("[admin] {} created article {}", user.email, article.slug);
    Ok(back_to("/admin/article/"))
}

pub async fn article_edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let article = state
        .repo
        .find_article(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let tags = state.repo.article_tags(article.id).await?;

    let mut context = page_context(Some(&user));
    context.insert("article", &article);
    context.insert("tag_names", &joined_names(&tags));
    state.render("admin/article_form.html", &context)
}

pub async fn article_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ArticleForm>,
) -> AppResult<Response> {
    let article = state
        .repo
        .find_article(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let changes = ArticleChanges {
        tags: Some(form.tag_names()),
        title: Some(form.title),
        body: Some(form.body),
    };
    let article = state.repo.update_article(article, changes).await?;
    info!("[admin] {} updated article {}", user.email, article.slug);
    Ok(back_to("/admin/article/"))
}

pub async fn article_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    if !state.repo.delete_article(id).await? {
        return Err(AppError::NotFound);
    }
    info!("[admin] {} deleted article {}", user.email, id);
    Ok(back_to("/admin/article/"))
}

// ---------------------------------------------------------------
// Tag
// ---------------------------------------------------------------

pub async fn tag_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let tags = state.repo.list_tags().await?;
    let mut context = page_context(Some(&user));
    context.insert("tags", &tags);
    state.render("admin/tag_list.html", &context)
}

pub async fn tag_new_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let mut context = page_context(Some(&user));
    context.insert("tag", &Option::<Tag>::None);
    state.render("admin/tag_form.html", &context)
}

pub async fn tag_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<TagForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Err(AppError::BadRequest("标签名称不能为空".to_string()));
    }
    let tag = state.repo.create_tag(&form.name).await?;
    info!("[admin] {} created tag {}", user.email, tag.slug);
    Ok(back_to("/admin/tag/"))
}

pub async fn tag_edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let tag = state.repo.find_tag(id).await?.ok_or(AppError::NotFound)?;
    let mut context = page_context(Some(&user));
    context.insert("tag", &tag);
    state.render("admin/tag_form.html", &context)
}

/// 重命名标签，别名不变
pub async fn tag_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<TagForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Err(AppError::BadRequest("标签名称不能为空".to_string()));
    }
    let tag = state
        .repo
        .rename_tag(id, &form.name)
        .await?
        .ok_or(AppError::NotFound)?;
    info!("[admin] {} renamed tag {} to {}", user.email, tag.slug, tag.name);
    Ok(back_to("/admin/tag/"))
}

pub async fn tag_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    if !state.repo.delete_tag(id).await? {
        return Err(AppError::NotFound);
    }
    info!("[admin] {} deleted tag {}", user.email, id);
    Ok(back_to("/admin/tag/"))
}
