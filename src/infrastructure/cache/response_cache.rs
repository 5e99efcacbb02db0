// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::RequestTask;
use crate::utils::url_utils::normalize_url;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// 缓存的原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: String,
    pub headers: HashMap<String, String>,
    pub status_code: u16,
    pub fetched_at: DateTime<Utc>,
    /// 内容是否来自渲染器
    pub rendered: bool,
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedResponse,
    /// 为空表示永不过期
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 缓存统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// 因容量被淘汰的条目
    pub evictions: u64,
    /// 因过期被移除的条目
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

/// 响应缓存
///
/// 容量与 TTL 双重约束：过期条目在读取时惰性删除；插入新键且已满时，
/// 先清理过期条目，仍然满则淘汰最久未使用的条目。
pub struct ResponseCache {
    inner: Option<Mutex<CacheInner>>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// 创建缓存
    ///
    /// # 参数
    ///
    /// * `max_entries` - 最大条目数，0 表示禁用缓存
    /// * `default_ttl` - 默认有效期，0 表示永不过期
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let inner = NonZeroUsize::new(max_entries).map(|cap| {
            Mutex::new(CacheInner {
                entries: LruCache::new(cap),
                stats: CacheStats {
                    capacity: max_entries,
                    ..CacheStats::default()
                },
            })
        });
        Self { inner, default_ttl }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 查询缓存，过期条目视为未命中并删除
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let inner = self.inner.as_ref()?;
        let now = Instant::now();
        let mut guard = inner.lock();
        let CacheInner { entries, stats } = &mut *guard;

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                stats.hits += 1;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            stats.expirations += 1;
            debug!(key, "Cache entry expired");
        }
        stats.misses += 1;
        None
    }

    /// 写入缓存，使用默认有效期
    pub fn insert(&self, key: impl Into<String>, value: CachedResponse) {
        self.set(key, value, self.default_ttl);
    }

    /// 写入缓存
    ///
    /// # 参数
    ///
    /// * `ttl` - 有效期，0 表示永不过期
    pub fn set(&self, key: impl Into<String>, value: CachedResponse, ttl: Duration) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let key = key.into();
        let now = Instant::now();
        let mut guard = inner.lock();
        let CacheInner { entries, stats } = &mut *guard;

        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            stats.expirations += purge(entries, now) as u64;
            if entries.len() >= entries.cap().get() {
                if let Some((evicted, _)) = entries.pop_lru() {
                    stats.evictions += 1;
                    debug!(key = %evicted, "Evicted least recently used cache entry");
                }
            }
        }

        // A ttl too large to represent never expires, like a zero ttl
        let expires_at = if ttl.is_zero() { None } else { now.checked_add(ttl) };
        entries.put(key, CacheEntry { value, expires_at });
        stats.stores += 1;
    }

    /// 删除指定键
    pub fn delete(&self, key: &str) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.lock().entries.pop(key).is_some())
    }

    /// 清空缓存
    pub fn clear(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.lock().entries.clear();
        }
    }

    /// 清理全部过期条目
    ///
    /// # 返回值
    ///
    /// 被清理的条目数
    pub fn purge_expired(&self) -> usize {
        let Some(inner) = self.inner.as_ref() else {
            return 0;
        };
        let mut guard = inner.lock();
        let CacheInner { entries, stats } = &mut *guard;
        let removed = purge(entries, Instant::now());
        stats.expirations += removed as u64;
        removed
    }

    /// 当前条目数（含尚未被惰性删除的过期条目）
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.lock().entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        match self.inner.as_ref() {
            Some(inner) => {
                let guard = inner.lock();
                CacheStats {
                    entries: guard.entries.len(),
                    ..guard.stats.clone()
                }
            }
            None => CacheStats::default(),
        }
    }
}

fn purge(entries: &mut LruCache<String, CacheEntry>, now: Instant) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key);
    }
    expired.len()
}

/// 计算缓存键
///
/// SHA-256(规范化URL + 方法 + 请求体 [+ 选择器签名])。URL 无法解析时使用原始字符串。
/// 请求体总是参与计算，不同表单内容的 POST 不会共用缓存。
pub fn cache_key(task: &RequestTask, include_selectors: bool) -> String {
    let url = normalize_url(&task.url).unwrap_or_else(|_| task.url.trim().to_string());
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(task.method.to_string().as_bytes());

    if let Some(body) = &task.body {
        hasher.update(b"\nbody:");
        hasher.update((body.len() as u64).to_be_bytes());
        hasher.update(body.as_bytes());
    }

    if include_selectors {
        hasher.update(b"\nselectors:");
        // SelectorMap is a BTreeMap, so the serialized form is canonical
        let signature = serde_json::to_string(&task.selectors).unwrap_or_default();
        hasher.update(signature.as_bytes());
    }

    hex::encode(hasher.finalize())
}
