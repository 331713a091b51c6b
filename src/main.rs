// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 缓存式正向 HTTP 代理
//!
//! 启动流程：
//! - 载入 TOML 配置并初始化 log4rs 日志
//! - 按配置构建多线程 Tokio 运行时
//! - 绑定代理端口与统计查询端口
//! - 启动统计收集任务与查询服务，进入接收循环，直到收到 Ctrl-C

use std::{
    env,
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
};

use log::{error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{net::TcpListener, runtime::Builder};

use webproxy::{
    config::Config,
    server,
    stats::{self, SharedStatistics},
    Forwarder, ResponseCache, StatsHandle,
};

fn main() {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/proxy.toml".to_string());
    let config = Config::from_toml(&config_path);

    init_logging(config.log_config());
    info!("配置文件{}已载入", config_path);

    // 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let code = runtime.block_on(run(config));
    process::exit(code);
}

async fn run(config: Config) -> i32 {
    let address = match config.local() {
        true => Ipv4Addr::LOCALHOST,
        false => Ipv4Addr::UNSPECIFIED,
    };

    let listener = match TcpListener::bind(SocketAddrV4::new(address, config.port())).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定代理端口：{}，错误：{}", config.port(), e);
            return 1;
        }
    };
    let stats_listener =
        match TcpListener::bind(SocketAddrV4::new(address, config.stats_port())).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定统计端口：{}，错误：{}", config.stats_port(), e);
                return 1;
            }
        };
    info!("统计查询服务将在{}端口上监听", config.stats_port());

    let (handle, rx) = StatsHandle::channel();
    let statistics = SharedStatistics::default();
    tokio::spawn(stats::collect(rx, Arc::clone(&statistics)));
    tokio::spawn(stats::serve_stats(stats_listener, statistics));

    // 所有连接共享同一个缓存
    let forwarder = Arc::new(Forwarder::new(Arc::new(ResponseCache::new()), handle));

    tokio::select! {
        _ = server::run(listener, forwarder) => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("收到中断信号，代理退出"),
            Err(e) => error!("无法监听中断信号：{}", e),
        },
    }
    0
}

/// 优先从 YAML 文件初始化 log4rs，失败时退回到控制台输出
fn init_logging(path: &str) {
    let e = match log4rs::init_file(path, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {m}{n}",
        )))
        .build();
    let fallback = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match fallback {
        Ok(fallback) => {
            if log4rs::init_config(fallback).is_ok() {
                warn!("无法从{}载入日志配置：{}，使用控制台输出", path, e);
            }
        }
        Err(errors) => eprintln!("无法初始化日志系统：{}", errors),
    }
}
