// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 请求与响应共用的行读取、头部解析与序列化工具。

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{exception::Exception, param::CRLF};

/// 头部表：名称保持收到时的大小写，重复名称以最后一次为准，不保证顺序。
///
/// 这是有意保留的简化：多值头部会被折叠成一个值，且只支持单 token 的值。
pub type Headers = HashMap<String, String>;

/// 读取一行（包含结尾的 `\n`），返回读到的字节数，0 表示流已结束。
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize, Exception>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = reader.read_until(b'\n', buf).await?;
    Ok(n)
}

/// 读取起始行并拆分为恰好三个 token。
///
/// 流在起始行之前结束时返回 `ConnectionClosed`；起始行被 EOF 截断时返回
/// `UnexpectedEof` 的 I/O 错误；token 数不为 3 时由 `malformed` 构造对应的解析错误。
pub async fn read_start_line<R, F>(reader: &mut R, malformed: F) -> Result<[String; 3], Exception>
where
    R: AsyncBufRead + Unpin,
    F: FnOnce(String) -> Exception,
{
    let mut buf = Vec::new();
    if read_line(reader, &mut buf).await? == 0 {
        return Err(Exception::ConnectionClosed);
    }
    if !buf.ends_with(b"\n") {
        return Err(Exception::Io(io::ErrorKind::UnexpectedEof.into()));
    }
    let line = std::str::from_utf8(&buf).map_err(|_| Exception::NotUtf8)?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [a, b, c] => Ok([a.to_string(), b.to_string(), c.to_string()]),
        _ => Err(malformed(line.trim_end().to_string())),
    }
}

/// 逐行读取头部，直到遇到长度不超过 2 的空行或流结束。
pub async fn read_headers<R>(reader: &mut R) -> Result<Headers, Exception>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Headers::new();
    let mut buf = Vec::new();
    loop {
        let n = read_line(reader, &mut buf).await?;
        // 被 EOF 截断的行直接丢弃
        if n == 0 || !buf.ends_with(b"\n") {
            break;
        }
        if buf.len() <= 2 {
            break;
        }
        let line = std::str::from_utf8(&buf).map_err(|_| Exception::NotUtf8)?;
        let (name, value) = parse_header_line(line)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// 把 `Name: value` 拆成名称与值，名称末尾的冒号会被去掉。
pub fn parse_header_line(line: &str) -> Result<(String, String), Exception> {
    let malformed = || Exception::MalformedHeader(line.trim_end().to_string());
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [name, value] = tokens.as_slice() else {
        return Err(malformed());
    };
    match name.strip_suffix(':') {
        Some(name) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(malformed()),
    }
}

/// 按头部表的迭代顺序序列化为 `Name: value\r\n` 行。
pub fn format_headers(headers: &Headers) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str(CRLF);
    }
    out
}

/// 查找头部：先精确匹配名称，再退回到 ASCII 大小写不敏感匹配。
pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    if let Some(v) = headers.get(name) {
        return Some(v);
    }
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
