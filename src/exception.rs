// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了代理在解析报文、连接源站以及读写套接字时可能出现的各类异常。
//!
//! ## 分类
//! - **解析错误**：请求行、状态行或头部格式非法，受影响的连接直接关闭，不做重试。
//! - **拨号错误**：源站不可达，关闭客户端连接，不回退到过期缓存。
//! - **I/O 错误**：客户端或源站套接字读写失败，关闭受影响的连接。
//!
//! `Content-Length` 非数字的情况不在此列，它在原地被视为 0。

use std::io;

use thiserror::Error;

/// 代理处理连接过程中发生的异常类型。
#[derive(Debug, Error)]
pub enum Exception {
    /// 对端在发送起始行之前就关闭了连接。这是正常结束，而非错误。
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// 请求行不是恰好三个以空白分隔的 token。
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    /// 状态行不是恰好三个以空白分隔的 token。
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),
    /// 状态码无法解析为整数。
    #[error("invalid status code: {0:?}")]
    InvalidStatusCode(String),
    /// 头部行不是 `Name: value` 两个 token。
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// 起始行或头部行不是合法的 UTF-8。
    #[error("line bytes can't be parsed in UTF-8")]
    NotUtf8,
    #[error("couldn't connect to origin {host}: {source}")]
    Dial {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("io error ({0})")]
    Io(#[from] io::Error),
    #[error("config error ({0})")]
    Config(String),
}

impl Exception {
    /// 是否属于报文解析类错误
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Exception::MalformedRequestLine(_)
                | Exception::MalformedStatusLine(_)
                | Exception::InvalidStatusCode(_)
                | Exception::MalformedHeader(_)
                | Exception::NotUtf8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_classification() {
        assert!(Exception::MalformedRequestLine("GET /".to_string()).is_parse_error());
        assert!(Exception::MalformedHeader("Host".to_string()).is_parse_error());
        assert!(Exception::NotUtf8.is_parse_error());
        assert!(!Exception::ConnectionClosed.is_parse_error());
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(!Exception::Io(io).is_parse_error());
    }

    #[test]
    fn test_display() {
        let e = Exception::InvalidStatusCode("abc".to_string());
        assert_eq!(e.to_string(), "invalid status code: \"abc\"");
        let e = Exception::Dial {
            host: "example.com".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(e.to_string().starts_with("couldn't connect to origin example.com"));
    }
}
