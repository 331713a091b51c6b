// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 新鲜度策略
//!
//! 判定一个 `Cache-Control` 值是否允许缓存，并根据响应头计算过期时间。
//! 这里只有纯函数；是否命中缓存由转发引擎组合这些判定得出。
//!
//! 响应只有在请求侧与响应侧的 `Cache-Control` 都可缓存时才会写入缓存，
//! 客户端因此可以阻止缓存一个本身可缓存的响应。

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::{param::*, response::Response};

/// 值中包含 `no-store`、`private`、`no-cache` 或 `must-revalidate` 中任一项时不可缓存。
/// 空串（头部缺失）视为可缓存。
pub fn is_cacheable(cache_control: &str) -> bool {
    !UNCACHEABLE_DIRECTIVES
        .iter()
        .any(|directive| cache_control.contains(directive))
}

/// 以当前时间计算过期时间，见 [`compute_expiry_at`]。
pub fn compute_expiry(response: &Response) -> DateTime<Utc> {
    compute_expiry_at(response, Utc::now())
}

/// 计算过期时间：
/// 1. `Cache-Control` 含 `max-age=<秒>`：`now + 秒`
/// 2. 否则 `Expires` 是合法的 HTTP 日期：取该日期
/// 3. 否则为 `now`，即立刻过期
///
/// 非法的 `max-age` 或 `Expires` 会落到下一条规则，而不会让请求失败。
pub fn compute_expiry_at(response: &Response, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(expiry) = max_age(response.cache_control()).and_then(|d| now.checked_add_signed(d)) {
        return expiry;
    }
    if let Some(expiry) = response.header(HEADER_EXPIRES).and_then(parse_http_date) {
        return expiry;
    }
    now
}

/// 过期时间严格早于当前时间即为过期；从未设置过期时间的响应视为过期。
pub fn is_expired(response: &Response) -> bool {
    is_expired_at(response, Utc::now())
}

pub fn is_expired_at(response: &Response, now: DateTime<Utc>) -> bool {
    match response.expires_at() {
        Some(expires_at) => expires_at < now,
        None => true,
    }
}

fn max_age(cache_control: &str) -> Option<Duration> {
    let raw = MAX_AGE.captures(cache_control)?.get(1)?.as_str();
    match raw.parse::<i64>() {
        Ok(secs) if secs >= 0 => Duration::try_seconds(secs),
        _ => {
            debug!("忽略非法的max-age：{}", raw);
            None
        }
    }
}

/// 解析 HTTP 日期（`Wed, 21 Oct 2015 07:28:00 GMT`）。
///
/// 头部值只支持单个 token，因此也接受不含空白的 RFC 3339 形式。
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|date| date.with_timezone(&Utc))
        .ok()
}
