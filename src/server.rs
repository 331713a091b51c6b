// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 连接接收器：为每个接受的连接启动一个独立的转发任务。

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::{proxy::Forwarder, stats::StatsEvent};

/// 接收循环。接受连接失败只记录日志，不会中断循环；并发连接数没有上限。
pub async fn run(listener: TcpListener, forwarder: Arc<Forwarder>) {
    if let Ok(addr) = listener.local_addr() {
        info!("代理开始在{}上监听", addr);
    }
    forwarder.stats().emit(StatsEvent::started(Utc::now()));

    let mut id: u128 = 0;
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("接受连接时遇到错误：{}", e);
                continue;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let forwarder = Arc::clone(&forwarder);
        tokio::spawn(async move {
            let termination = forwarder.serve(stream, id).await;
            if termination.is_graceful() {
                debug!("[ID{}]连接结束：{}", id, termination);
            } else {
                info!("[ID{}]连接异常结束：{}", id, termination);
            }
        });
        id += 1;
    }
}
