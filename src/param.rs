// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 代理协议参数与常量模块
//!
//! 该模块集中定义了代理在编解码、缓存与转发过程中用到的常量，包括：
//! - 报文分隔符与常用头部名称。
//! - 禁止缓存的 `Cache-Control` 指令表。
//! - 默认端口与读缓冲区大小。

use lazy_static::lazy_static;
use regex::Regex;

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 源站端口。代理只以明文 TCP 连接 `Host:80`。
pub const HTTP_PORT: u16 = 80;

/// 代理监听的默认端口
pub const DEFAULT_PROXY_PORT: u16 = 54321;

/// 统计查询服务的默认端口
pub const DEFAULT_STATS_PORT: u16 = 54322;

/// 读取响应体时每次读取的块大小
pub const READ_CHUNK_SIZE: usize = 1024;

/// 缓存键中方法与目标之间的分隔符，方法 token 中不可能出现 NUL。
pub const CACHE_KEY_SEPARATOR: char = '\u{0}';

/// 统计报告中每个排行榜最多展示的条目数
pub const STATS_TOP_N: usize = 5;

pub const HEADER_HOST: &str = "Host";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_CONNECTION: &str = "Connection";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_EXPIRES: &str = "Expires";

/// 出现任一指令即视为不可缓存（区分大小写的子串匹配）。
pub const UNCACHEABLE_DIRECTIVES: [&str; 4] = ["no-store", "private", "no-cache", "must-revalidate"];

lazy_static! {
    /// `max-age=<seconds>`，允许紧跟一个逗号；不会误匹配 `s-maxage`。
    pub static ref MAX_AGE: Regex = Regex::new(r"(?:^|[,\s])max-age=([^,\s]*)").unwrap();
}
