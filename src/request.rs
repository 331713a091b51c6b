// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求编解码模块
//!
//! 负责把客户端字节流解码为 `Request`，以及把 `Request` 原样写往源站。
//! 1. 请求行：恰好三个以空白分隔的 token（方法、目标、版本）。
//! 2. 头部：逐行读取，直到空行或流结束。
//!
//! 请求体不在此处理，代理只转发请求头。

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::{
    exception::Exception,
    param::*,
    util::{find_header, format_headers, read_headers, read_start_line, Headers},
};

/// 一次请求的元数据。转发之后即被丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// 请求方法，原样保留
    method: String,
    /// 请求目标（request-URI）
    target: String,
    /// 协议版本，例如 `HTTP/1.1`
    version: String,
    headers: Headers,
}

impl Request {
    pub fn new(method: &str, target: &str, version: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers: Headers::new(),
        }
    }

    /// 设置一个头部，同名头部会被覆盖
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// 从流中解码一个请求。
    ///
    /// # 错误处理
    /// - 流在请求行之前结束：`Exception::ConnectionClosed`
    /// - 请求行 token 数不为 3：`Exception::MalformedRequestLine`
    /// - 头部行格式非法：`Exception::MalformedHeader`
    pub async fn decode<R>(reader: &mut R) -> Result<Self, Exception>
    where
        R: AsyncBufRead + Unpin,
    {
        let [method, target, version] =
            read_start_line(reader, Exception::MalformedRequestLine).await?;
        let headers = read_headers(reader).await?;
        Ok(Self {
            method,
            target,
            version,
            headers,
        })
    }

    /// 序列化为请求行、头部与结尾空行
    pub fn as_bytes(&self) -> Vec<u8> {
        [
            self.method.as_str(),
            " ",
            self.target.as_str(),
            " ",
            self.version.as_str(),
            CRLF,
            format_headers(&self.headers).as_str(),
            CRLF,
        ]
        .concat()
        .into_bytes()
    }

    /// 写出请求并刷新
    pub async fn encode<W>(&self, writer: &mut W) -> Result<(), Exception>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// 源站地址，缺失时请求无法转发
    pub fn host(&self) -> Option<&str> {
        find_header(&self.headers, HEADER_HOST)
    }

    /// 请求侧的 `Cache-Control`，缺失时为空串
    pub fn cache_control(&self) -> &str {
        find_header(&self.headers, HEADER_CACHE_CONTROL).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(raw: &str) -> Result<Request, Exception> {
        let mut input = raw.as_bytes();
        Request::decode(&mut input).await
    }

    /// 验证常规 GET 请求的解析
    #[tokio::test]
    async fn test_parse_get_request() {
        let request = parse("GET /a HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n")
            .await
            .unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.target(), "/a");
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.host(), Some("example.com"));
        assert_eq!(request.cache_control(), "");
    }

    /// 方法与版本原样保留，不做大小写转换
    #[tokio::test]
    async fn test_method_kept_verbatim() {
        let request = parse("purge http://a/b HTTP/1.0\r\n\r\n").await.unwrap();
        assert_eq!(request.method(), "purge");
        assert_eq!(request.target(), "http://a/b");
        assert_eq!(request.version(), "HTTP/1.0");
        assert!(request.headers().is_empty());
    }

    #[tokio::test]
    async fn test_request_line_too_few_tokens() {
        let result = parse("GET /\r\nHost: a\r\n\r\n").await;
        assert!(matches!(result, Err(Exception::MalformedRequestLine(_))));
    }

    /// 路径中包含空格会产生第四个 token
    #[tokio::test]
    async fn test_request_line_too_many_tokens() {
        let result = parse("GET /a b HTTP/1.1\r\nHost: a\r\n\r\n").await;
        assert!(matches!(result, Err(Exception::MalformedRequestLine(_))));
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed() {
        assert!(matches!(parse("").await, Err(Exception::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let result = parse("GET / HTTP/1.1\r\nUser-Agent: Test Browser\r\n\r\n").await;
        assert!(matches!(result, Err(Exception::MalformedHeader(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut input: &[u8] = &[0xFF, 0xFE, b' ', b'/', b' ', b'H', b'\r', b'\n'];
        let result = Request::decode(&mut input).await;
        assert!(matches!(result, Err(Exception::NotUtf8)));
    }

    /// 同一流上连续两个请求可以依次解码
    #[tokio::test]
    async fn test_sequential_requests() {
        let mut input: &[u8] = b"GET /1 HTTP/1.1\r\nHost: a\r\n\r\nGET /2 HTTP/1.1\r\nHost: b\r\n\r\n";
        let first = Request::decode(&mut input).await.unwrap();
        let second = Request::decode(&mut input).await.unwrap();
        assert_eq!(first.target(), "/1");
        assert_eq!(second.target(), "/2");
        assert_eq!(second.host(), Some("b"));
        assert!(matches!(
            Request::decode(&mut input).await,
            Err(Exception::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_encode_round_trip() {
        let request = Request::new("GET", "/index.html", "HTTP/1.1")
            .with_header("Host", "example.com")
            .with_header("Cache-Control", "no-cache");

        let mut out = Vec::new();
        request.encode(&mut out).await.unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("GET /index.html HTTP/1.1\r\n"));
        assert!(text.ends_with("\r\n\r\n"));

        let decoded = Request::decode(&mut out.as_slice()).await.unwrap();
        assert_eq!(decoded, request);
    }
}
