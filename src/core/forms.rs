use axum::extract::Multipart;
use serde::Deserialize;
use tracing::debug;

use crate::core::error::{AppError, AppResult};
use crate::core::upload::UploadedFile;

/// 逗号分隔的标签输入
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 文章表单（multipart）
///
/// 文件字段可以叫 `file`（博客页面）或 `image`（管理后台）。
#[derive(Debug, Default)]
pub struct PostForm {
    pub title: Option<String>,
    pub body: Option<String>,
    /// 表单中出现过 `tags` 字段时为 `Some`
    pub tags: Option<Vec<String>>,
    pub file: Option<UploadedFile>,
    /// 请求里是否带有文件字段，哪怕没有选择文件
    pub has_file_part: bool,
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(Self::text(field).await?),
                "body" => form.body = Some(Self::text(field).await?),
                "tags" => {
                    let value = Self::text(field).await?;
                    form.tags
                        .get_or_insert_with(Vec::new)
                        .extend(split_tags(&value));
                }
                "file" | "image" => {
                    form.has_file_part = true;
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.file = Some(UploadedFile::new(filename, bytes));
                }
                other => debug!("Ignoring form field {}", other),
            }
        }

        Ok(form)
    }

    async fn text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
        field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }

    /// 选择了非空文件时返回该文件
    pub fn selected_file(&self) -> Option<&UploadedFile> {
        self.file.as_ref().filter(|f| !f.is_empty())
    }
}

/// 管理后台的 Article 表单
#[derive(Debug, Deserialize)]
pub struct ArticleForm {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: String,
}

impl ArticleForm {
    pub fn tag_names(&self) -> Vec<String> {
        split_tags(&self.tags)
    }
}

/// 管理后台的 Tag 表单
#[derive(Debug, Deserialize)]
pub struct TagForm {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(split_tags("rust, web ,, news "), vec!["rust", "web", "news"]);
        assert!(split_tags("  ").is_empty());
    }

    #[test]
    fn empty_file_is_not_selected() {
        let form = PostForm {
            file: Some(UploadedFile::new("", Vec::new())),
            has_file_part: true,
            ..Default::default()
        };
        assert!(form.has_file_part);
        assert!(form.selected_file().is_none());
    }
}
