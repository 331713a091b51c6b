use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::warn;

use crate::{param::CACHE_KEY_SEPARATOR, response::Response};

/// 以 `(方法, 目标)` 为键的响应缓存。
///
/// 内部加锁，`get` 与 `set` 各自原子，但两次调用之间不持锁：并发的同键请求
/// 可能都未命中、都去源站取回并各自写入，最后一次 `set` 生效。
/// 缓存没有容量上限也不会主动淘汰，过期与否在查询后由调用方判断。
#[derive(Default)]
pub struct ResponseCache {
    table: Mutex<HashMap<String, Response>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    // 查询，过期条目同样返回
    pub fn get(&self, method: &str, target: &str) -> Option<Response> {
        self.lock().get(&cache_key(method, target)).cloned()
    }

    // 覆盖写入
    pub fn set(&self, method: &str, target: &str, response: Response) {
        self.lock().insert(cache_key(method, target), response);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Response>> {
        match self.table.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

fn cache_key(method: &str, target: &str) -> String {
    let mut key = String::with_capacity(method.len() + target.len() + 1);
    key.push_str(method);
    key.push(CACHE_KEY_SEPARATOR);
    key.push_str(target);
    key
}
