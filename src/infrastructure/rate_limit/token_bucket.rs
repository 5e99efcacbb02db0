// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::RateLimitSettings;
use crate::utils::errors::RateLimitError;
use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 浮点误差容忍
const TOKEN_EPSILON: f64 = 1e-9;

/// 令牌桶参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketConfig {
    /// 桶容量
    pub capacity: f64,
    /// 每秒补充的令牌数
    pub refill_rate: f64,
    /// 突发上限
    pub burst: Option<f64>,
}

impl BucketConfig {
    /// 桶内最多可积累的令牌数
    fn max_tokens(&self) -> f64 {
        let ceiling = match self.burst {
            Some(burst) => burst.min(self.capacity),
            None => self.capacity,
        };
        ceiling.max(1.0)
    }
}

impl From<&RateLimitSettings> for BucketConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            capacity: settings.capacity,
            refill_rate: settings.refill_rate,
            burst: settings.burst,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// 单个键的令牌桶
///
/// 状态放在公平（FIFO）的异步锁里，等待补充的调用方持有锁睡眠，
/// 后来者只能排在它后面，因此不会有调用方被无限期插队。
#[derive(Debug)]
struct TokenBucket {
    state: Mutex<BucketState>,
    max_tokens: f64,
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &BucketConfig) -> Self {
        let max_tokens = config.max_tokens();
        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_rate: config.refill_rate.max(0.0),
        }
    }

    // Lazy refill from elapsed time; no background timer
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        state.last_refill = now;
    }

    async fn take(&self) {
        let mut state = self.state.lock().await;
        loop {
            self.refill(&mut state, Instant::now());
            if state.tokens >= 1.0 - TOKEN_EPSILON {
                state.tokens = (state.tokens - 1.0).max(0.0);
                return;
            }
            let wait = (1.0 - state.tokens) / self.refill_rate;
            match Duration::try_from_secs_f64(wait) {
                Ok(wait) if self.refill_rate > 0.0 => tokio::time::sleep(wait).await,
                // No refill, or one too slow to express; the caller's timeout decides
                _ => std::future::pending::<()>().await,
            }
        }
    }

    fn try_take(&self) -> bool {
        let Ok(mut state) = self.state.try_lock() else {
            return false;
        };
        self.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 - TOKEN_EPSILON {
            state.tokens = (state.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens
    }
}

/// 按键（通常是目标主机）限流的令牌桶
///
/// 桶在第一次使用时创建，所有键共享同一组参数。
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Arc<TokenBucket>>,
    config: BucketConfig,
}

impl RateLimiter {
    pub fn new(config: BucketConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    fn bucket(&self, key: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.clone();
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(&self.config)))
            .clone()
    }

    /// 获取一个令牌
    ///
    /// 挂起直到获得令牌或超时。
    ///
    /// # 返回值
    ///
    /// * `Err(RateLimitError::RateLimited)` - 超时仍未获得令牌
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Result<(), RateLimitError> {
        let bucket = self.bucket(key);
        let start = Instant::now();

        match tokio::time::timeout(timeout, bucket.take()).await {
            Ok(()) => {
                debug!(key, waited_ms = start.elapsed().as_millis() as u64, "Rate limit token acquired");
                Ok(())
            }
            Err(_) => {
                let waited_ms = start.elapsed().as_millis() as u64;
                counter!("rate_limit_rejections_total").increment(1);
                warn!(key, waited_ms, "Rate limit token not acquired in time");
                Err(RateLimitError::RateLimited {
                    key: key.to_string(),
                    waited_ms,
                })
            }
        }
    }

    /// 不等待地尝试获取令牌；有其它调用方在排队时直接返回 false
    pub fn try_acquire(&self, key: &str) -> bool {
        self.bucket(key).try_take()
    }

    /// 当前可用令牌数（已按时间补充）
    pub async fn available(&self, key: &str) -> f64 {
        self.bucket(key).available().await
    }
}
