use anyhow::Result;

use crate::models::Sluggable;

/// 模型保存前的回调
///
/// 由仓库在字段校验之后、提交之前调用，`is_created` 表示是否为新建。
pub trait ModelChangeHook: Send + Sync {
    fn on_model_change(&self, model: &mut dyn Sluggable, is_created: bool) -> Result<()>;
}

/// 保存前按标题重新生成别名
#[derive(Debug, Default, Clone, Copy)]
pub struct RegenerateSlug;

impl ModelChangeHook for RegenerateSlug {
    fn on_model_change(&self, model: &mut dyn Sluggable, _is_created: bool) -> Result<()> {
        model.generate_slug();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;

    #[test]
    fn regenerate_slug_overwrites_stale_slug() {
        let mut post = Post::new("Fresh Title", "");
        post.slug = "stale".to_string();

        RegenerateSlug.on_model_change(&mut post, false).unwrap();
        assert_eq!(post.slug, "Fresh-Title");
    }
}
