use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::slugify;

/// 由标题派生别名的内容
pub trait Sluggable {
    /// 当前标题
    fn title(&self) -> &str;

    /// 写入新的别名
    fn set_slug(&mut self, slug: String);

    /// 根据标题重新生成别名，空标题保持原别名不变
    fn generate_slug(&mut self) {
        if !self.title().is_empty() {
            let slug = slugify(self.title());
            self.set_slug(slug);
        }
    }
}

/// 博客文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    /// 主键，尚未保存时为 0
    pub id: i64,
    /// 标题
    pub title: String,
    /// 唯一别名，随标题变化
    pub slug: String,
    /// 正文
    pub body: String,
    /// 创建时间
    pub created: DateTime<Utc>,
    /// 图片相对路径，形如 `uploads/<name>`
    pub image: Option<String>,
}

impl Post {
    /// 创建新文章，同时生成别名
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let mut post = Post {
            id: 0,
            title: String::new(),
            slug: String::new(),
            body: body.into(),
            created: Utc::now(),
            image: None,
        };
        post.set_title(title);
        post
    }

    /// 附带图片
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// 修改标题会重新生成别名
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.generate_slug();
    }
}

impl Sluggable for Post {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

/// 文章（与 Post 相同，但没有图片）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub created: DateTime<Utc>,
}

impl Article {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let mut article = Article {
            id: 0,
            title: String::new(),
            slug: String::new(),
            body: body.into(),
            created: Utc::now(),
        };
        article.set_title(title);
        article
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.generate_slug();
    }
}

impl Sluggable for Article {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }
}

/// 标签
///
/// 别名只在构造时生成，改名不会更新别名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Tag { id: 0, name, slug }
    }
}

/// 后台用户
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC 字符串
    #[serde(skip_serializing)]
    pub password: String,
    pub active: bool,
}

/// 角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// 编辑文章时提交的字段，`None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    /// 标签名称列表，`Some` 时整体替换
    pub tags: Option<Vec<String>>,
    pub image: Option<String>,
}

/// 编辑 Article 时提交的字段
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_slug_follows_title() {
        let mut post = Post::new("My First Post", "body");
        assert_eq!(post.slug, "My-First-Post");

        post.set_title("My Updated Post");
        assert_eq!(post.slug, "My-Updated-Post");
    }

    #[test]
    fn empty_title_keeps_previous_slug() {
        let mut article = Article::new("Keep Me", "");
        article.set_title("");
        assert_eq!(article.slug, "Keep-Me");
    }

    #[test]
    fn tag_slug_is_fixed_at_construction() {
        let mut tag = Tag::new("Rust Lang");
        assert_eq!(tag.slug, "Rust-Lang");

        tag.name = "Rust".to_string();
        assert_eq!(tag.slug, "Rust-Lang");
    }
}
