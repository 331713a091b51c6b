// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 统计模块
//!
//! 代理核心只通过异步通道向这里发送事件，发送失败直接忽略。
//! 收集任务把事件汇总进 `Statistics`，查询端口上的每个连接
//! 都会收到一份纯文本报告，随后连接被关闭。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use tokio::{
    io::AsyncWriteExt,
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

use crate::param::STATS_TOP_N;

/// 被访问的资源及其大小（字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub size: u64,
}

/// 统计事件，字段为任意非空子集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsEvent {
    pub active_delta: i64,
    pub host: Option<String>,
    pub resource: Option<Resource>,
    pub start_time: Option<DateTime<Utc>>,
}

impl StatsEvent {
    pub fn connection_opened() -> Self {
        Self {
            active_delta: 1,
            ..Default::default()
        }
    }

    pub fn connection_closed() -> Self {
        Self {
            active_delta: -1,
            ..Default::default()
        }
    }

    pub fn visit(host: &str, target: &str, size: u64) -> Self {
        Self {
            host: Some(host.to_string()),
            resource: Some(Resource {
                name: target.to_string(),
                size,
            }),
            ..Default::default()
        }
    }

    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(at),
            ..Default::default()
        }
    }
}

/// 统计事件的发送端，可随意克隆
#[derive(Debug, Clone)]
pub struct StatsHandle {
    tx: Option<UnboundedSender<StatsEvent>>,
}

impl StatsHandle {
    pub fn channel() -> (Self, UnboundedReceiver<StatsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// 丢弃所有事件的句柄
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: StatsEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("统计通道已关闭，事件被丢弃");
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Statistics {
    start_time: Option<DateTime<Utc>>,
    active_connections: i64,
    host_visits: HashMap<String, u64>,
    resource_visits: HashMap<String, u64>,
    resource_sizes: HashMap<String, u64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: StatsEvent) {
        self.active_connections += event.active_delta;
        if let Some(start_time) = event.start_time {
            self.start_time = Some(start_time);
        }
        if let Some(host) = event.host {
            *self.host_visits.entry(host).or_insert(0) += 1;
        }
        if let Some(resource) = event.resource {
            *self.resource_visits.entry(resource.name.clone()).or_insert(0) += 1;
            // 同名资源以最近一次的大小为准
            self.resource_sizes.insert(resource.name, resource.size);
        }
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections
    }

    pub fn host_visits(&self, host: &str) -> u64 {
        self.host_visits.get(host).copied().unwrap_or(0)
    }

    pub fn resource_visits(&self, name: &str) -> u64 {
        self.resource_visits.get(name).copied().unwrap_or(0)
    }

    /// 生成纯文本报告
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str("== Proxy 统计 ===\n");
        match self.start_time {
            Some(start) => out.push_str(&format!("运行时长: {}s\n", (now - start).num_seconds())),
            None => out.push_str("运行时长: 未知\n"),
        }
        out.push_str(&format!("当前活跃连接数: {}\n", self.active_connections));
        out.push_str(&format!("最多展示条目数: {}\n\n", STATS_TOP_N));

        out.push_str("[访问次数] [主机]\n");
        for (host, count) in top_n(&self.host_visits) {
            out.push_str(&format!("{}\t\t{}\n", count, host));
        }
        out.push_str("----------------------\n");

        out.push_str("[访问次数] [资源]\n");
        for (name, count) in top_n(&self.resource_visits) {
            out.push_str(&format!("{}\t\t{}\n", count, name));
        }
        out.push_str("----------------------\n");

        out.push_str("[大小(字节)] [资源]\n");
        for (name, size) in top_n(&self.resource_sizes) {
            out.push_str(&format!("{}\t\t\t{}\n", size, name));
        }
        out
    }
}

/// 按数值降序、名称升序取前 N 项
fn top_n(map: &HashMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(STATS_TOP_N);
    entries
}

pub type SharedStatistics = Arc<Mutex<Statistics>>;

fn lock(stats: &SharedStatistics) -> MutexGuard<'_, Statistics> {
    match stats.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("统计锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 持续接收事件直到所有发送端被丢弃
pub async fn collect(mut rx: UnboundedReceiver<StatsEvent>, stats: SharedStatistics) {
    while let Some(event) = rx.recv().await {
        lock(&stats).apply(event);
    }
    debug!("统计通道已关闭，收集任务退出");
}

/// 在查询端口上为每个连接写出一份报告
pub async fn serve_stats(listener: TcpListener, stats: SharedStatistics) {
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("统计端口接受连接失败：{}", e);
                continue;
            }
        };
        debug!("统计查询连接：{}", addr);
        let report = lock(&stats).render(Utc::now());
        tokio::spawn(async move {
            if let Err(e) = stream.write_all(report.as_bytes()).await {
                warn!("发送统计报告失败：{}", e);
                return;
            }
            let _ = stream.shutdown().await;
        });
    }
}
