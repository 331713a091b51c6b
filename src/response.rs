// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应编解码模块
//!
//! 从源站连接读取响应（状态行、头部、响应体），并把响应写回客户端。
//!
//! 响应体一直读到流结束为止，因此要求写端在一个报文之后关闭连接。
//! 代理每次交换后都会关闭源站连接，满足这一前提；若将来复用上游连接，
//! 这里必须改为按 `Content-Length` 或分块编码定界读取。

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use log::warn;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    exception::Exception,
    param::*,
    util::{find_header, format_headers, read_headers, read_start_line, Headers},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: String,
    status_code: u16,
    /// 原因短语，只支持单个 token
    reason: String,
    headers: Headers,
    body: Bytes,
    /// 仅在写入缓存时设置
    expires_at: Option<DateTime<Utc>>,
}

impl Response {
    pub fn new(version: &str, status_code: u16, reason: &str) -> Self {
        Self {
            version: version.to_string(),
            status_code,
            reason: reason.to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
            expires_at: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 从流中解码一个完整响应，响应体读到 EOF 为止。
    pub async fn decode<R>(reader: &mut R) -> Result<Self, Exception>
    where
        R: AsyncBufRead + Unpin,
    {
        let [version, code, reason] =
            read_start_line(reader, Exception::MalformedStatusLine).await?;
        let status_code = code
            .parse::<u16>()
            .map_err(|_| Exception::InvalidStatusCode(code.clone()))?;
        let headers = read_headers(reader).await?;

        let mut body = BytesMut::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut chunk).await? {
                0 => break,
                n => body.extend_from_slice(&chunk[..n]),
            }
        }

        Ok(Self {
            version,
            status_code,
            reason,
            headers,
            body: body.freeze(),
            expires_at: None,
        })
    }

    /// 序列化为状态行、头部、空行与响应体
    pub fn as_bytes(&self) -> Vec<u8> {
        let head = [
            self.version.as_str(),
            " ",
            self.status_code.to_string().as_str(),
            " ",
            self.reason.as_str(),
            CRLF,
            format_headers(&self.headers).as_str(),
            CRLF,
        ]
        .concat();
        [head.as_bytes(), &self.body[..]].concat()
    }

    /// 写出响应并刷新
    pub async fn encode<W>(&self, writer: &mut W) -> Result<(), Exception>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    pub fn set_expires_at(&mut self, expires_at: DateTime<Utc>) -> &mut Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl Response {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// 响应侧的 `Cache-Control`，缺失时为空串
    pub fn cache_control(&self) -> &str {
        self.header(HEADER_CACHE_CONTROL).unwrap_or("")
    }

    /// 源站是否要求关闭连接
    pub fn wants_close(&self) -> bool {
        self.header(HEADER_CONNECTION) == Some("close")
    }

    /// 由 `Content-Length` 得出的资源大小，缺失或非数字时为 0
    pub fn content_length(&self) -> u64 {
        match self.header(HEADER_CONTENT_LENGTH) {
            None => 0,
            Some(value) => value.parse::<u64>().unwrap_or_else(|_| {
                warn!("Content-Length不是合法数字：{}，按0处理", value);
                0
            }),
        }
    }
}
