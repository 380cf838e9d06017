// 仓库层集成测试，使用内存 SQLite

use std::sync::Arc;

use blog_cms::core::{Database, RegenerateSlug, Repository};
use blog_cms::models::{Article, ArticleChanges, Post, PostChanges};

async fn repository() -> Repository {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    Repository::new(db).with_hook(Arc::new(RegenerateSlug))
}

#[tokio::test]
async fn title_edit_moves_the_slug() {
    let repo = repository().await;
    let post = repo
        .create_post(Post::new("My First Post", "hello"), &[])
        .await
        .unwrap();
    assert_eq!(post.slug, "My-First-Post");

    let changes = PostChanges {
        title: Some("My Updated Post".to_string()),
        ..Default::default()
    };
    let post = repo.update_post(post, changes).await.unwrap();
    assert_eq!(post.slug, "My-Updated-Post");

    assert!(repo.find_post_by_slug("My-First-Post").await.unwrap().is_none());
    let found = repo.find_post_by_slug("My-Updated-Post").await.unwrap().unwrap();
    assert_eq!(found.id, post.id);
    assert_eq!(found.body, "hello");
}

#[tokio::test]
async fn duplicate_post_slug_is_rejected() {
    let repo = repository().await;
    repo.create_post(Post::new("Same Title", ""), &[]).await.unwrap();
    assert!(repo.create_post(Post::new("Same  Title", ""), &[]).await.is_err());
}

#[tokio::test]
async fn search_matches_body_only_posts() {
    let repo = repository().await;
    repo.create_post(Post::new("Cooking", "how to bake bread"), &[])
        .await
        .unwrap();
    repo.create_post(Post::new("Travel", "mountains"), &[])
        .await
        .unwrap();

    let found = repo.search_posts("bread").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Cooking");

    let pages = repo.list_posts(Some("bread"), 1, 5).await.unwrap();
    assert_eq!(pages.total, 1);

    // 通配符按字面匹配
    assert!(repo.search_posts("%").await.unwrap().is_empty());
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let repo = repository().await;
    for i in 0..3 {
        repo.create_post(Post::new(format!("Post {}", i), ""), &[])
            .await
            .unwrap();
    }

    let first = repo.list_posts(None, 1, 2).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.pages, 2);
    assert!(first.has_next);
    // 新文章在前
    assert_eq!(first.items[0].title, "Post 2");

    let beyond = repo.list_posts(None, 5, 2).await.unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 3);
    assert!(!beyond.has_next);
}

#[tokio::test]
async fn tag_lookup_and_distinct_posts() {
    let repo = repository().await;
    let post = repo
        .create_post(
            Post::new("Tagged", "body"),
            &["Rust Lang".to_string(), "web".to_string(), "web".to_string()],
        )
        .await
        .unwrap();
    repo.create_post(Post::new("Other", ""), &["web".to_string()])
        .await
        .unwrap();

    let tags = repo.post_tags(post.id).await.unwrap();
    assert_eq!(tags.len(), 2);

    let rust = repo.find_tag_by_slug("Rust-Lang").await.unwrap().unwrap();
    assert_eq!(rust.name, "Rust Lang");
    assert!(repo.find_tag_by_slug("missing").await.unwrap().is_none());

    // 手动插入重复的关联行
    sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
        .bind(post.id)
        .bind(rust.id)
        .execute(repo.database().pool())
        .await
        .unwrap();
    let posts = repo.tag_posts(rust.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post.id);

    let web = repo.find_tag_by_slug("web").await.unwrap().unwrap();
    assert_eq!(repo.tag_posts(web.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn renaming_a_tag_keeps_its_slug() {
    let repo = repository().await;
    let tag = repo.create_tag("Old Name").await.unwrap();
    let renamed = repo.rename_tag(tag.id, "New Name").await.unwrap().unwrap();
    assert_eq!(renamed.name, "New Name");
    assert_eq!(renamed.slug, "Old-Name");
    assert!(repo.rename_tag(9999, "x").await.unwrap().is_none());
}

#[tokio::test]
async fn colliding_tag_slugs_resolve_to_oldest() {
    let repo = repository().await;
    let first = repo.create_tag("c++").await.unwrap();
    let second = repo.create_tag("c#").await.unwrap();
    assert_eq!(first.slug, second.slug);

    let found = repo.find_tag_by_slug(&first.slug).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn articles_share_tags_with_posts() {
    let repo = repository().await;
    let article = repo
        .create_article(Article::new("An Article", "text"), &["news".to_string()])
        .await
        .unwrap();
    assert_eq!(article.slug, "An-Article");

    let article = repo
        .update_article(
            article,
            ArticleChanges {
                title: Some("Renamed Article".to_string()),
                tags: Some(vec!["news".to_string(), "misc".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(article.slug, "Renamed-Article");
    assert_eq!(repo.article_tags(article.id).await.unwrap().len(), 2);

    let news = repo.find_tag_by_slug("news").await.unwrap().unwrap();
    assert_eq!(repo.tag_articles(news.id).await.unwrap().len(), 1);

    assert!(repo.delete_article(article.id).await.unwrap());
    assert!(repo.tag_articles(news.id).await.unwrap().is_empty());
    assert!(!repo.delete_article(article.id).await.unwrap());
}

#[tokio::test]
async fn users_get_existing_roles() {
    let repo = repository().await;
    repo.create_role("admin", Some("Administrator")).await.unwrap();

    let user = repo
        .create_user("a@example.com", "$argon2id$fake", true, &["admin".to_string()])
        .await
        .unwrap();
    let roles = repo.user_roles(user.id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "admin");

    assert!(repo
        .create_user("b@example.com", "x", true, &["missing".to_string()])
        .await
        .is_err());
    assert!(repo.find_user_by_email("b@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn blank_titles_slugify_to_a_single_hyphen() {
    let repo = repository().await;
    let post = repo.create_post(Post::new("   ", "body"), &[]).await.unwrap();
    assert_eq!(post.slug, "-");
    assert!(repo.find_post_by_slug("-").await.unwrap().is_some());

    let article = repo
        .create_article(Article::new("   ", "text"), &[])
        .await
        .unwrap();
    assert_eq!(article.slug, "-");

    // 空标题保留原别名
    let other = repo.create_post(Post::new("Keep Me", ""), &[]).await.unwrap();
    let other = repo
        .update_post(
            other,
            PostChanges {
                title: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(other.slug, "Keep-Me");
}
