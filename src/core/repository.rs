use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::core::db::Database;
use crate::core::hooks::ModelChangeHook;
use crate::core::pagination::Pagination;
use crate::models::{
    Article, ArticleChanges, Post, PostChanges, Role, Sluggable, Tag, User,
};

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.body, p.created, p.image";
const ARTICLE_COLUMNS: &str = "a.id, a.title, a.slug, a.body, a.created";

/// 可以打标签的内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tagged {
    Post,
    Article,
}

impl Tagged {
    /// 关联表与外键列
    fn link(self) -> (&'static str, &'static str) {
        match self {
            Tagged::Post => ("post_tags", "post_id"),
            Tagged::Article => ("articles_tags", "article_id"),
        }
    }
}

/// 转义 LIKE 通配符
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// 标签名称去空白、去重，保持原顺序
fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_string()))
        .map(str::to_string)
        .collect()
}

/// 内容仓库
///
/// 所有读写都经过这里；每次修改立即提交。
#[derive(Clone)]
pub struct Repository {
    db: Database,
    hooks: Arc<Vec<Arc<dyn ModelChangeHook>>>,
}

impl Repository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            hooks: Arc::new(Vec::new()),
        }
    }

    /// 注册保存前回调
    pub fn with_hook(mut self, hook: Arc<dyn ModelChangeHook>) -> Self {
        Arc::make_mut(&mut self.hooks).push(hook);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn run_hooks(&self, model: &mut dyn Sluggable, is_created: bool) -> Result<()> {
        for hook in self.hooks.iter() {
            hook.on_model_change(model, is_created)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Post
    // ---------------------------------------------------------------

    /// 保存新文章及其标签
    pub async fn create_post(&self, mut post: Post, tags: &[String]) -> Result<Post> {
        self.run_hooks(&mut post, true)?;

        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query(
            "INSERT INTO post (title, slug, body, created, image) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.body)
        .bind(post.created)
        .bind(&post.image)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("插入文章失败: {}", post.slug))?;
        post.id = result.last_insert_rowid();

        Self::replace_tags(&mut *tx, Tagged::Post, post.id, tags).await?;
        tx.commit().await?;

        info!("Created post {} ({})", post.id, post.slug);
        Ok(post)
    }

    /// 应用编辑后的字段；标题变化时重新生成别名
    pub async fn update_post(&self, mut post: Post, changes: PostChanges) -> Result<Post> {
        if let Some(title) = changes.title {
            if title != post.title {
                post.set_title(title);
            }
        }
        if let Some(body) = changes.body {
            post.body = body;
        }
        if let Some(image) = changes.image {
            post.image = Some(image);
        }
        self.run_hooks(&mut post, false)?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("UPDATE post SET title = ?, slug = ?, body = ?, image = ? WHERE id = ?")
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.body)
            .bind(&post.image)
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("更新文章失败: {}", post.id))?;

        if let Some(tags) = changes.tags {
            Self::replace_tags(&mut *tx, Tagged::Post, post.id, &tags).await?;
        }
        tx.commit().await?;

        info!("Updated post {} ({})", post.id, post.slug);
        Ok(post)
    }

    /// 按别名精确查找
    pub async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        debug!("Looking up post by slug {}", slug);
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM post p WHERE p.slug = ?"
        ))
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(post)
    }

    pub async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM post p WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(post)
    }

    /// 标题或正文包含子串的文章
    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM post p
             WHERE p.title LIKE ?1 ESCAPE '\\' OR p.body LIKE ?1 ESCAPE '\\'
             ORDER BY p.id"
        ))
        .bind(like_pattern(query))
        .fetch_all(self.db.pool())
        .await?;
        Ok(posts)
    }

    /// 分页列出文章
    ///
    /// 有查询词时按搜索结果分页，否则按创建时间倒序。
    pub async fn list_posts(
        &self,
        query: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Pagination<Post>> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = Pagination::<Post>::offset(page, per_page);

        let (total, items) = match query.filter(|q| !q.is_empty()) {
            Some(q) => {
                let pattern = like_pattern(q);
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM post p
                     WHERE p.title LIKE ?1 ESCAPE '\\' OR p.body LIKE ?1 ESCAPE '\\'",
                )
                .bind(&pattern)
                .fetch_one(self.db.pool())
                .await?;
                let items = sqlx::query_as::<_, Post>(&format!(
                    "SELECT {POST_COLUMNS} FROM post p
                     WHERE p.title LIKE ?1 ESCAPE '\\' OR p.body LIKE ?1 ESCAPE '\\'
                     ORDER BY p.id LIMIT ?2 OFFSET ?3"
                ))
                .bind(&pattern)
                .bind(per_page as i64)
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?;
                (total, items)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post")
                    .fetch_one(self.db.pool())
                    .await?;
                let items = sqlx::query_as::<_, Post>(&format!(
                    "SELECT {POST_COLUMNS} FROM post p
                     ORDER BY p.created DESC, p.id DESC LIMIT ? OFFSET ?"
                ))
                .bind(per_page as i64)
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?;
                (total, items)
            }
        };

        Ok(Pagination::new(items, page, per_page, total.max(0) as u64))
    }

    /// 删除文章及其标签关联，返回是否存在
    pub async fn delete_post(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;

        if deleted {
            info!("Deleted post {}", id);
        }
        Ok(deleted)
    }

    pub async fn post_tags(&self, post_id: i64) -> Result<Vec<Tag>> {
        self.tags_of(Tagged::Post, post_id).await
    }

    // ---------------------------------------------------------------
    // Article
    // ---------------------------------------------------------------

    pub async fn create_article(&self, mut article: Article, tags: &[String]) -> Result<Article> {
        self.run_hooks(&mut article, true)?;

        let mut tx = self.db.pool().begin().await?;
        let result =
            sqlx::query("INSERT INTO article (title, slug, body, created) VALUES (?, ?, ?, ?)")
                .bind(&article.title)
                .bind(&article.slug)
                .bind(&article.body)
                .bind(article.created)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("插入 article 失败: {}", article.slug))?;
        article.id = result.last_insert_rowid();

        Self::replace_tags(&mut *tx, Tagged::Article, article.id, tags).await?;
        tx.commit().await?;

        info!("Created article {} ({})", article.id, article.slug);
        Ok(article)
    }

    pub async fn update_article(
        &self,
        mut article: Article,
        changes: ArticleChanges,
    ) -> Result<Article> {
        if let Some(title) = changes.title {
            if title != article.title {
                article.set_title(title);
            }
        }
        if let Some(body) = changes.body {
            article.body = body;
        }
        self.run_hooks(&mut article, false)?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("UPDATE article SET title = ?, slug = ?, body = ? WHERE id = ?")
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.body)
            .bind(article.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("更新 article 失败: {}", article.id))?;

        if let Some(tags) = changes.tags {
            Self::replace_tags(&mut *tx, Tagged::Article, article.id, &tags).await?;
        }
        tx.commit().await?;

        info!("Updated article {} ({})", article.id, article.slug);
        Ok(article)
    }

    pub async fn find_article(&self, id: i64) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM article a WHERE a.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(article)
    }

    pub async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM article a WHERE a.slug = ?"
        ))
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(article)
    }

    pub async fn list_articles(&self, page: u32, per_page: u32) -> Result<Pagination<Article>> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article")
            .fetch_one(self.db.pool())
            .await?;
        let items = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM article a
             ORDER BY a.created DESC, a.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(per_page as i64)
        .bind(Pagination::<Article>::offset(page, per_page))
        .fetch_all(self.db.pool())
        .await?;
        Ok(Pagination::new(items, page, per_page, total.max(0) as u64))
    }

    pub async fn delete_article(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM articles_tags WHERE article_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM article WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;

        if deleted {
            info!("Deleted article {}", id);
        }
        Ok(deleted)
    }

    pub async fn article_tags(&self, article_id: i64) -> Result<Vec<Tag>> {
        self.tags_of(Tagged::Article, article_id).await
    }

    // ---------------------------------------------------------------
    // Tag
    // ---------------------------------------------------------------

    /// 按别名查找标签；别名可能重复，取最早创建的那个
    pub async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            "SELECT id, name, slug FROM tag WHERE slug = ? ORDER BY id LIMIT 1",
        )
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(tag)
    }

    pub async fn find_tag(&self, id: i64) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tag WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(tag)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tag ORDER BY name, id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(tags)
    }

    /// 带有该标签的文章，不重复
    pub async fn tag_posts(&self, tag_id: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT DISTINCT {POST_COLUMNS} FROM post p
             JOIN post_tags pt ON pt.post_id = p.id
             WHERE pt.tag_id = ?
             ORDER BY p.created DESC, p.id DESC"
        ))
        .bind(tag_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(posts)
    }

    pub async fn tag_articles(&self, tag_id: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT DISTINCT {ARTICLE_COLUMNS} FROM article a
             JOIN articles_tags l ON l.article_id = a.id
             WHERE l.tag_id = ?
             ORDER BY a.created DESC, a.id DESC"
        ))
        .bind(tag_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(articles)
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("标签名称不能为空"));
        }
        let mut conn = self.db.pool().acquire().await?;
        Self::insert_tag(&mut *conn, name).await
    }

    /// 修改标签名称，别名保持不变
    pub async fn rename_tag(&self, id: i64, name: &str) -> Result<Option<Tag>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("标签名称不能为空"));
        }
        let updated = sqlx::query("UPDATE tag SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(self.db.pool())
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.find_tag(id).await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;
        for (table, _) in [Tagged::Post.link(), Tagged::Article.link()] {
            sqlx::query(&format!("DELETE FROM {table} WHERE tag_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let deleted = sqlx::query("DELETE FROM tag WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        if deleted {
            info!("Deleted tag {}", id);
        }
        Ok(deleted)
    }

    async fn tags_of(&self, kind: Tagged, owner_id: i64) -> Result<Vec<Tag>> {
        let (table, column) = kind.link();
        let tags = sqlx::query_as::<_, Tag>(&format!(
            "SELECT DISTINCT t.id, t.name, t.slug FROM tag t
             JOIN {table} l ON l.tag_id = t.id
             WHERE l.{column} = ?
             ORDER BY t.name, t.id"
        ))
        .bind(owner_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(tags)
    }

    async fn insert_tag(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
        let mut tag = Tag::new(name);

        let clashes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag WHERE slug = ?")
            .bind(&tag.slug)
            .fetch_one(&mut *conn)
            .await?;
        if clashes > 0 {
            warn!(
                "Tag '{}' shares slug '{}' with {} existing tag(s)",
                tag.name, tag.slug, clashes
            );
        }

        tag.id = sqlx::query("INSERT INTO tag (name, slug) VALUES (?, ?)")
            .bind(&tag.name)
            .bind(&tag.slug)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("插入标签失败: {}", tag.name))?
            .last_insert_rowid();

        info!("Created tag {} ({})", tag.id, tag.slug);
        Ok(tag)
    }

    /// 按名称复用已有标签，不存在时创建
    async fn tag_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
        let existing = sqlx::query_as::<_, Tag>(
            "SELECT id, name, slug FROM tag WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        match existing {
            Some(tag) => Ok(tag),
            None => Self::insert_tag(conn, name).await,
        }
    }

    /// 用给定名称集合替换内容的标签
    async fn replace_tags(
        conn: &mut SqliteConnection,
        kind: Tagged,
        owner_id: i64,
        names: &[String],
    ) -> Result<()> {
        let (table, column) = kind.link();
        sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ?"))
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        for name in normalize_tag_names(names) {
            let tag = Self::tag_by_name(conn, &name).await?;
            sqlx::query(&format!("INSERT INTO {table} ({column}, tag_id) VALUES (?, ?)"))
                .bind(owner_id)
                .bind(tag.id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // User / Role
    // ---------------------------------------------------------------

    pub async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role> {
        let id = sqlx::query("INSERT INTO role (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(self.db.pool())
            .await
            .with_context(|| format!("创建角色失败: {}", name))?
            .last_insert_rowid();
        info!("Created role {}", name);
        Ok(Role {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    /// 创建用户并关联已存在的角色
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        active: bool,
        roles: &[String],
    ) -> Result<User> {
        let mut tx = self.db.pool().begin().await?;
        let id = sqlx::query("INSERT INTO user (email, password, active) VALUES (?, ?, ?)")
            .bind(email)
            .bind(password_hash)
            .bind(active)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("创建用户失败: {}", email))?
            .last_insert_rowid();

        for role in roles {
            let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM role WHERE name = ?")
                .bind(role)
                .fetch_optional(&mut *tx)
                .await?;
            let role_id = role_id.ok_or_else(|| anyhow!("角色不存在: {}", role))?;
            sqlx::query("INSERT INTO roles_users (user_id, role_id) VALUES (?, ?)")
                .bind(id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!("Created user {}", email);
        Ok(User {
            id,
            email: email.to_string(),
            password: password_hash.to_string(),
            active,
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password, active FROM user WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, email, password, active FROM user WHERE id = ?")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(user)
    }

    pub async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT DISTINCT r.id, r.name, r.description FROM role r
             JOIN roles_users ru ON ru.role_id = r.id
             WHERE ru.user_id = ?
             ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }

    #[test]
    fn tag_names_are_trimmed_and_deduplicated() {
        let names = vec![
            " rust ".to_string(),
            "web".to_string(),
            "rust".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_tag_names(&names), vec!["rust", "web"]);
    }
}
