use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::OnceLock;

/// 路径段中需要编码的字符，保留 RFC 3986 的非保留字符
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// ASCII 字母、数字、下划线以外字符的连续片段
fn non_word_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid slug pattern"))
}

/// 从标题生成 URL 友好的别名
///
/// 每一段连续的非 ASCII 字母、非数字、非下划线字符都被替换成一个 `-`，
/// 不会去掉首尾的连字符，也不改变大小写。结果只包含 `[A-Za-z0-9_-]`。
pub fn slugify(text: &str) -> String {
    non_word_run().replace_all(text, "-").into_owned()
}

/// 确保路径以斜杠结尾
pub fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// 确保路径以斜杠开头
pub fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// 对单个路径段做百分号编码，空格编码为 `%20`
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// 文章详情页地址
pub fn slug_url(prefix: &str, slug: &str) -> String {
    join_url(prefix, &encode_segment(slug))
}

/// 把挂载前缀与相对路径拼接成绝对路径
pub fn join_url(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{}{}", prefix, ensure_leading_slash(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("Hello, World!"), "Hello-World-");
        assert_eq!(slugify("My First Post"), "My-First-Post");
    }

    #[test]
    fn slugify_keeps_case_and_underscores() {
        assert_eq!(slugify("snake_case Title"), "snake_case-Title");
        assert_eq!(slugify("  leading"), "-leading");
    }

    #[test]
    fn slugify_empty_and_unicode() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("Привет мир"), "-");
        assert_eq!(slugify("Café Über"), "Caf-ber");
        assert_eq!(slugify("   "), "-");
        assert_eq!(slugify("C++ & Rust"), "C-Rust");
    }

    #[test]
    fn slugify_output_alphabet() {
        let slug = slugify("a/b\\c?d#e%f  g--h");
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert!(!slug.contains("--"));
        assert_eq!(slug, "a-b-c-d-e-f-g-h");
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("/blog", "tag/rust"), "/blog/tag/rust");
        assert_eq!(join_url("/blog/", "/create"), "/blog/create");
        assert_eq!(join_url("", "/"), "/");
        assert_eq!(ensure_trailing_slash("/blog"), "/blog/");
    }

    #[test]
    fn slug_urls_are_header_safe() {
        assert_eq!(slug_url("/blog", "My-First-Post"), "/blog/My-First-Post");
        assert_eq!(slug_url("/blog", "Привет"), "/blog/%D0%9F%D1%80%D0%B8%D0%B2%D0%B5%D1%82");
    }

    #[test]
    fn path_segments_use_percent_twenty() {
        assert_eq!(encode_segment("a b"), "a%20b");
        assert_eq!(encode_segment("c++"), "c%2B%2B");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("-_.~"), "-_.~");
    }
}
