use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::DateTime;
use tera::{Tera, Value};
use tracing::{debug, error};

use crate::models::User;
use crate::utils::{encode_segment, join_url};

/// 内置模板
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("posts/index.html", include_str!("../../templates/posts/index.html")),
    ("posts/post_detail.html", include_str!("../../templates/posts/post_detail.html")),
    ("posts/tag_detail.html", include_str!("../../templates/posts/tag_detail.html")),
    ("posts/create_post.html", include_str!("../../templates/posts/create_post.html")),
    ("posts/edit_post.html", include_str!("../../templates/posts/edit_post.html")),
    ("security/login.html", include_str!("../../templates/security/login.html")),
    ("admin/index.html", include_str!("../../templates/admin/index.html")),
    ("admin/post_list.html", include_str!("../../templates/admin/post_list.html")),
    ("admin/post_form.html", include_str!("../../templates/admin/post_form.html")),
    ("admin/article_list.html", include_str!("../../templates/admin/article_list.html")),
    ("admin/article_form.html", include_str!("../../templates/admin/article_form.html")),
    ("admin/tag_list.html", include_str!("../../templates/admin/tag_list.html")),
    ("admin/tag_form.html", include_str!("../../templates/admin/tag_form.html")),
];

/// 所有页面共用的上下文：当前访问者与搜索框内容
pub fn page_context(viewer: Option<&User>) -> tera::Context {
    let mut context = tera::Context::new();
    context.insert("viewer", &viewer);
    context.insert("q", "");
    context
}

/// `url_for(path=..., slug=..., suffix=...)`，slug 会被编码
struct UrlFor {
    prefix: String,
}

impl tera::Function for UrlFor {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let slug = args
            .get("slug")
            .and_then(Value::as_str)
            .map(encode_segment)
            .unwrap_or_default();
        let suffix = args.get("suffix").and_then(Value::as_str).unwrap_or("");
        Ok(Value::String(join_url(
            &self.prefix,
            &format!("{}{}{}", path, slug, suffix),
        )))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// `static_url(path=...)`
struct StaticUrl;

impl tera::Function for StaticUrl {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("缺少必要的参数: path"))?;
        Ok(Value::String(join_url("/static", path)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// 页面渲染器
pub struct ThemeRenderer {
    /// 模板引擎
    tera: Tera,
}

impl ThemeRenderer {
    /// 加载内置模板并注册过滤器和函数
    pub fn new(blog_prefix: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())
            .context("加载内置模板失败")?;

        tera.register_filter("date_format", Self::date_format_filter);

        tera.register_function(
            "url_for",
            UrlFor {
                prefix: blog_prefix.to_string(),
            },
        );
        tera.register_function("static_url", StaticUrl);

        debug!("Loaded {} templates", TEMPLATES.len());
        Ok(Self { tera })
    }

    /// 渲染模板
    pub fn render(&self, template: &str, context: &tera::Context) -> tera::Result<String> {
        self.tera.render(template, context).map_err(|e| {
            error!("模板渲染失败: {} ({:?})", template, e);
            e
        })
    }

    fn date_format_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        if let Some(date) = value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            let format = args
                .get("format")
                .and_then(|f| f.as_str())
                .unwrap_or("%Y-%m-%d %H:%M");
            Ok(Value::String(date.format(format).to_string()))
        } else {
            Ok(value.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_are_registered() {
        let renderer = ThemeRenderer::new("/blog").unwrap();
        let names: Vec<&str> = renderer.tera.get_template_names().collect();
        for (name, _) in TEMPLATES {
            assert!(names.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn date_filter_formats_rfc3339() {
        let value = Value::String("2024-03-05T10:20:30Z".to_string());
        let mut args = HashMap::new();
        args.insert("format".to_string(), Value::String("%d.%m.%Y".to_string()));
        let out = ThemeRenderer::date_format_filter(&value, &args).unwrap();
        assert_eq!(out, Value::String("05.03.2024".to_string()));
    }

    #[test]
    fn login_page_renders() {
        let renderer = ThemeRenderer::new("/blog").unwrap();
        let mut context = page_context(None);
        context.insert("next", "/blog/create");
        context.insert("email", "");
        context.insert("error", &Option::<String>::None);
        let html = renderer.render("security/login.html", &context).unwrap();
        assert!(html.contains("blog&#x2F;create"));
        assert!(html.contains("href=\"/login\""));
    }

    #[test]
    fn url_for_encodes_slugs() {
        let mut renderer = ThemeRenderer::new("/blog").unwrap();
        renderer
            .tera
            .add_raw_template(
                "urls",
                "{{ url_for(path='tag/', slug=s) }}|{{ url_for(slug=s, suffix='/edit/') }}|{{ url_for(path='/') }}|{{ static_url(path='uploads/a.png') }}",
            )
            .unwrap();
        let mut context = tera::Context::new();
        context.insert("s", "a b");
        assert_eq!(
            renderer.render("urls", &context).unwrap(),
            "/blog/tag/a%20b|/blog/a%20b/edit/|/blog/|/static/uploads/a.png"
        );
    }
}
