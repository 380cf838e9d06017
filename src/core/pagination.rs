use serde::Serialize;

/// 列表默认每页条数
pub const DEFAULT_PER_PAGE: u32 = 5;

/// 解析查询参数中的页码
///
/// 缺失、非数字或为 0 时回退到第 1 页。
pub fn parse_page(raw: Option<&str>) -> u32 {
    raw.filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&page| page >= 1)
        .unwrap_or(1)
}

/// 分页结果
#[derive(Debug, Clone, Serialize)]
pub struct Pagination<T> {
    /// 当前页的条目
    pub items: Vec<T>,
    /// 当前页码，从 1 开始
    pub page: u32,
    pub per_page: u32,
    /// 总条目数
    pub total: u64,
    /// 总页数
    pub pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u32>,
    pub next_num: Option<u32>,
}

impl<T> Pagination<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        let pages = total.div_ceil(per_page as u64) as u32;
        let has_prev = page > 1;
        let has_next = page < pages;
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }

    /// 当前页在整个结果中的偏移
    pub fn offset(page: u32, per_page: u32) -> i64 {
        (page.max(1) as i64 - 1) * per_page as i64
    }

    /// 页码列表，用于渲染分页导航
    pub fn iter_pages(&self) -> impl Iterator<Item = u32> {
        1..=self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pages_fall_back_to_first() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-3")), 1);
        assert_eq!(parse_page(Some("+2")), 1);
        assert_eq!(parse_page(Some("99999999999999")), 1);
        assert_eq!(parse_page(Some("3")), 3);
    }

    #[test]
    fn navigation_flags() {
        let p = Pagination::new(vec![1, 2, 3, 4, 5], 2, 5, 12);
        assert_eq!(p.pages, 3);
        assert!(p.has_prev && p.has_next);
        assert_eq!(p.prev_num, Some(1));
        assert_eq!(p.next_num, Some(3));
        assert_eq!(p.iter_pages().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let p: Pagination<i32> = Pagination::new(Vec::new(), 7, 5, 12);
        assert!(p.items.is_empty());
        assert!(!p.has_next);
        assert_eq!(p.next_num, None);
        assert_eq!(p.prev_num, Some(6));
    }

    #[test]
    fn offsets() {
        assert_eq!(Pagination::<()>::offset(1, 5), 0);
        assert_eq!(Pagination::<()>::offset(3, 5), 10);
    }
}
