// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::RetrySettings;
use std::time::Duration;

/// 重试策略配置
///
/// `max_attempts` 包含首次请求：值为 3 时最多发起 3 次网络请求
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 初始退避时间
    pub backoff_base: Duration,
    /// 最大退避时间
    pub backoff_max: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 随机抖动上限，叠加在指数退避之上
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: Duration::from_millis(250),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            backoff_max: Duration::from_millis(settings.backoff_max_ms),
            backoff_multiplier: 2.0,
            jitter: Duration::from_millis(settings.backoff_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// 不退避、不抖动的策略，主要用于测试
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            backoff_multiplier: 2.0,
            jitter: Duration::ZERO,
        }
    }

    /// 不含抖动的指数退避时间
    ///
    /// # 参数
    ///
    /// * `attempt` - 刚刚失败的尝试序号（从 1 开始）
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let backoff_secs = self.backoff_base.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = backoff_secs.min(self.backoff_max.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// 计算下次重试前的等待时间（指数退避 + 随机抖动）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = rand::random_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }

    /// 是否还允许再尝试一次
    ///
    /// # 参数
    ///
    /// * `attempts_made` - 已经发起的尝试次数
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
