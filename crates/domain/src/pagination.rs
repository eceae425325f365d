//! 消息历史分页
//!
//! 第 1 页是最新的 `limit` 条消息。查询按时间倒序取数，再翻转成阅读顺序。

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// 从查询参数构造。缺失或非数字时取默认值，数值被强制到 >= 1。
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = coerce(page, DEFAULT_PAGE);
        let limit = coerce(limit, DEFAULT_LIMIT);
        Self::new(page, limit)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

fn coerce(raw: Option<&str>, default: u32) -> u32 {
    match raw.map(str::trim).and_then(|value| value.parse::<i64>().ok()) {
        Some(value) => value.clamp(1, i64::from(u32::MAX)) as u32,
        None => default,
    }
}

/// 返回给调用方的分页信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl PageInfo {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit());
        Self {
            page: request.page(),
            limit: request.limit(),
            total,
            pages: total.div_ceil(limit),
        }
    }
}
