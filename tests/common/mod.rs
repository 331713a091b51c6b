// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的本地源站、代理与客户端工具。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use webproxy::{server, Forwarder, ResponseCache, StatsHandle};

/// 测试用的硬超时，防止用例因连接挂起而永久阻塞
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// 本地假源站：记录连接次数与收到的请求头，每次交换后关闭连接
pub struct Origin {
    pub port: u16,
    dials: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Origin {
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// 启动源站。`respond` 以连接序号（从 0 开始）生成完整的响应字节。
pub async fn start_origin<F>(delay: Duration, respond: F) -> Origin
where
    F: Fn(usize) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dials = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let counter = Arc::clone(&dials);
    let log = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let respond = Arc::clone(&respond);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.split();
                let mut reader = BufReader::new(read_half);
                let head = read_head(&mut reader).await;
                log.lock().unwrap().push(head);
                tokio::time::sleep(delay).await;
                let _ = write_half.write_all(&(*respond)(n)).await;
                let _ = write_half.shutdown().await;
            });
        }
    });

    Origin {
        port,
        dials,
        requests,
    }
}

/// 返回固定响应的源站
pub async fn start_static_origin(response: &'static str) -> Origin {
    start_origin(Duration::ZERO, move |_| response.as_bytes().to_vec()).await
}

/// 启动代理，源站端口指向本地假源站
pub async fn start_proxy(origin_port: u16) -> (SocketAddr, Arc<ResponseCache>) {
    start_proxy_with_stats(origin_port, StatsHandle::disabled()).await
}

pub async fn start_proxy_with_stats(
    origin_port: u16,
    stats: StatsHandle,
) -> (SocketAddr, Arc<ResponseCache>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cache = Arc::new(ResponseCache::new());
    let forwarder = Arc::new(Forwarder::new(Arc::clone(&cache), stats).with_origin_port(origin_port));
    tokio::spawn(server::run(listener, forwarder));
    (addr, cache)
}

/// 一个未被监听的本地端口
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            reader: BufReader::new(stream),
        }
    }

    pub async fn send(&mut self, raw: &[u8]) {
        self.reader.get_mut().write_all(raw).await.unwrap();
    }

    /// 读取一个以 Content-Length 定界的响应，返回 (头部, 响应体)
    pub async fn read_response(&mut self) -> (String, Vec<u8>) {
        tokio::time::timeout(TIMEOUT, async {
            let head = read_head(&mut self.reader).await;
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0u8; len];
            self.reader.read_exact(&mut body).await.unwrap();
            (head, body)
        })
        .await
        .expect("等待响应超时")
    }

    /// 读取直到代理关闭连接。连接被重置同样视为关闭。
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let _ = tokio::time::timeout(TIMEOUT, self.reader.read_to_end(&mut out))
            .await
            .expect("等待连接关闭超时");
        out
    }
}

/// 读到空行为止，返回不含空行的头部文本
pub async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> String {
    let mut head = String::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.unwrap_or(0);
        if n == 0 || line == "\r\n" {
            break;
        }
        head.push_str(&line);
    }
    head
}

pub fn get(target: &str, host: &str) -> String {
    format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, host)
}
