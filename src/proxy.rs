// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 转发引擎
//!
//! 每个客户端连接对应一个状态机实例：
//!
//! ```text
//! AwaitingRequest -> Resolving -> CacheHit | FetchingOrigin -> Responding
//!        ^                                                        |
//!        +------------------ 保持连接 ----------------------------+
//!                                                                 v
//!                                                            Terminated
//! ```
//!
//! 同一连接上的请求严格串行处理。源站连接只服务一次交换，读完响应体后立即关闭，
//! 与客户端连接是否保持无关。
//!
//! 所有读写都没有超时，一个迟迟不响应的源站或客户端只会卡住自己所在的连接。

use std::{fmt, sync::Arc};

use log::{debug, info, warn};
use tokio::{
    io::{self, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    net::TcpStream,
};

use crate::{
    cache::ResponseCache,
    exception::Exception,
    freshness::{compute_expiry, is_cacheable, is_expired},
    param::HTTP_PORT,
    request::Request,
    response::Response,
    stats::{StatsEvent, StatsHandle},
};

/// 连接结束的原因
#[derive(Debug)]
pub enum Termination {
    /// 客户端在两个请求之间关闭了连接
    ClientClosed,
    /// 请求或源站响应格式非法
    ParseError(Exception),
    /// 请求缺少 `Host` 头部
    MissingHost,
    /// 无法连接源站
    DialError(Exception),
    /// 客户端或源站套接字读写失败
    IoError(Exception),
    /// 响应带有 `Connection: close`
    CloseDirective,
}

impl Termination {
    fn from_exception(e: Exception) -> Self {
        match e {
            Exception::ConnectionClosed => Termination::ClientClosed,
            Exception::Dial { .. } => Termination::DialError(e),
            e if e.is_parse_error() => Termination::ParseError(e),
            e => Termination::IoError(e),
        }
    }

    /// 是否为协议层面的正常结束
    pub fn is_graceful(&self) -> bool {
        matches!(self, Termination::ClientClosed | Termination::CloseDirective)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::ClientClosed => write!(f, "client closed"),
            Termination::ParseError(e) => write!(f, "parse error: {}", e),
            Termination::MissingHost => write!(f, "missing Host header"),
            Termination::DialError(e) => write!(f, "dial error: {}", e),
            Termination::IoError(e) => write!(f, "io error: {}", e),
            Termination::CloseDirective => write!(f, "Connection: close"),
        }
    }
}

enum State {
    AwaitingRequest,
    Resolving(Request),
    CacheHit(Request, Response),
    FetchingOrigin(Request),
    Responding(Request, Response),
    Terminated(Termination),
}

/// 所有连接共享同一个缓存实例的转发器
pub struct Forwarder {
    cache: Arc<ResponseCache>,
    stats: StatsHandle,
    origin_port: u16,
}

impl Forwarder {
    pub fn new(cache: Arc<ResponseCache>, stats: StatsHandle) -> Self {
        Self {
            cache,
            stats,
            origin_port: HTTP_PORT,
        }
    }

    /// 改写源站端口，只用于把源站指向本地测试服务
    pub fn with_origin_port(mut self, port: u16) -> Self {
        self.origin_port = port;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn stats(&self) -> &StatsHandle {
        &self.stats
    }

    /// 处理一个客户端连接直到结束，返回结束原因。
    pub async fn serve<S>(&self, stream: S, id: u128) -> Termination
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.stats.emit(StatsEvent::connection_opened());

        let (read_half, write_half) = io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        let mut state = State::AwaitingRequest;
        let termination = loop {
            state = match state {
                State::AwaitingRequest => self.await_request(&mut reader, id).await,
                State::Resolving(request) => self.resolve(request, id),
                State::CacheHit(request, response) => {
                    debug!("[ID{}]缓存命中：{} {}", id, request.method(), request.target());
                    State::Responding(request, response)
                }
                State::FetchingOrigin(request) => self.fetch(request, id).await,
                State::Responding(request, response) => {
                    self.respond(&mut writer, request, response, id).await
                }
                State::Terminated(reason) => break reason,
            };
        };

        // 对端可能已经关闭，忽略错误
        let _ = writer.shutdown().await;
        self.stats.emit(StatsEvent::connection_closed());
        debug!("[ID{}]关闭客户端连接：{}", id, termination);
        termination
    }

    async fn await_request<R>(&self, reader: &mut R, id: u128) -> State
    where
        R: io::AsyncBufRead + Unpin,
    {
        match Request::decode(reader).await {
            Ok(request) if request.host().is_none() => {
                warn!("[ID{}]请求缺少Host头部：{}", id, request.target());
                State::Terminated(Termination::MissingHost)
            }
            Ok(request) => {
                debug!("[ID{}]成功解析HTTP请求：{} {}", id, request.method(), request.target());
                State::Resolving(request)
            }
            Err(e) => {
                if !matches!(e, Exception::ConnectionClosed) {
                    warn!("[ID{}]解析HTTP请求失败：{}", id, e);
                }
                State::Terminated(Termination::from_exception(e))
            }
        }
    }

    fn resolve(&self, request: Request, id: u128) -> State {
        let cached = match self.cache.get(request.method(), request.target()) {
            Some(cached) => cached,
            None => {
                debug!("[ID{}]缓存未命中", id);
                return State::FetchingOrigin(request);
            }
        };
        if !is_cacheable(request.cache_control()) {
            debug!("[ID{}]请求禁止使用缓存：{}", id, request.cache_control());
            return State::FetchingOrigin(request);
        }
        if is_expired(&cached) {
            debug!("[ID{}]缓存条目已过期", id);
            return State::FetchingOrigin(request);
        }
        State::CacheHit(request, cached)
    }

    async fn fetch(&self, request: Request, id: u128) -> State {
        let Some(host) = request.host().map(str::to_string) else {
            return State::Terminated(Termination::MissingHost);
        };

        let origin = match TcpStream::connect((host.as_str(), self.origin_port)).await {
            Ok(origin) => origin,
            Err(source) => {
                warn!("[ID{}]无法连接源站{}：{}", id, host, source);
                return State::Terminated(Termination::DialError(Exception::Dial { host, source }));
            }
        };
        info!("[ID{}]向源站{}请求资源{}", id, host, request.target());

        let response = exchange(origin, &request).await;
        // 源站连接此时已随 exchange 返回而关闭
        let mut response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("[ID{}](Host: {})处理源站响应失败：{}", id, host, e);
                let termination = match e {
                    Exception::ConnectionClosed => Termination::IoError(e),
                    e => Termination::from_exception(e),
                };
                return State::Terminated(termination);
            }
        };

        if is_cacheable(request.cache_control()) && is_cacheable(response.cache_control()) {
            let expires_at = compute_expiry(&response);
            response.set_expires_at(expires_at);
            self.cache.set(request.method(), request.target(), response.clone());
            debug!("[ID{}]响应已写入缓存，过期时间：{}", id, expires_at);
        } else {
            debug!("[ID{}]响应不可缓存，跳过缓存", id);
        }
        State::Responding(request, response)
    }

    async fn respond<W>(&self, writer: &mut W, request: Request, response: Response, id: u128) -> State
    where
        W: AsyncWrite + Unpin,
    {
        if let Err(e) = response.encode(writer).await {
            warn!("[ID{}]发送响应失败：{}", id, e);
            return State::Terminated(Termination::IoError(e));
        }

        info!(
            "[ID{}] {}, {}, {}, {}, {}",
            id,
            request.host().unwrap_or_default(),
            request.method(),
            request.target(),
            response.status_code(),
            response.body().len(),
        );
        self.stats.emit(StatsEvent::visit(
            request.host().unwrap_or_default(),
            request.target(),
            response.content_length(),
        ));

        if response.wants_close() {
            State::Terminated(Termination::CloseDirective)
        } else {
            debug!("[ID{}]保持客户端连接", id);
            State::AwaitingRequest
        }
    }
}

/// 在一条新的源站连接上完成一次请求/响应交换，返回时连接被关闭。
async fn exchange(origin: TcpStream, request: &Request) -> Result<Response, Exception> {
    let (read_half, write_half) = origin.into_split();
    let mut writer = BufWriter::new(write_half);
    request.encode(&mut writer).await?;
    let mut reader = BufReader::new(read_half);
    Response::decode(&mut reader).await
}
