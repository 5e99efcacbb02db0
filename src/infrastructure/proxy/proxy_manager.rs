// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ProxyHealthSettings;
use crate::domain::models::proxy::{
    ProxyPoolStats, ProxyRecord, ProxySnapshot, ProxyState, RotationStrategy, NEUTRAL_HEALTH,
};
use crate::utils::errors::ProxyError;
use metrics::counter;
use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 代理池内部状态
#[derive(Debug, Default)]
struct PoolState {
    proxies: Vec<ProxyRecord>,
    /// 轮询游标
    cursor: usize,
}

/// 代理管理器
///
/// 代理池的唯一所有者。所有读写都在同一把锁内完成，
/// 因此 `select` 与 `record_outcome` 是线性一致的：
/// 两个并发调用方不可能同时选中一个冷却中的代理，健康度更新也不会丢失。
pub struct ProxyManager {
    state: Mutex<PoolState>,
    config: ProxyHealthSettings,
}

impl ProxyManager {
    /// 创建空代理池
    pub fn new(config: ProxyHealthSettings) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            config,
        }
    }

    /// 从地址列表创建代理池
    ///
    /// # 返回值
    ///
    /// * `Err(ProxyError::InvalidUri)` - 任意地址无法解析
    pub fn from_uris<S: AsRef<str>>(
        uris: &[S],
        config: ProxyHealthSettings,
    ) -> Result<Self, ProxyError> {
        let manager = Self::new(config);
        manager.register_uris(uris)?;
        Ok(manager)
    }

    /// 注册代理
    ///
    /// 新代理以 ACTIVE 状态和中性健康度加入；已存在的代理保留其当前状态，
    /// 仅更新地址（例如轮换了认证信息）。DEAD 代理不会因重新注册而复活。
    ///
    /// # 返回值
    ///
    /// 新加入的代理数
    pub fn register(&self, proxies: Vec<ProxyRecord>) -> usize {
        let mut state = self.state.lock();
        let mut added = 0;
        for mut proxy in proxies {
            match state.proxies.iter_mut().find(|p| p.id == proxy.id) {
                Some(existing) => {
                    existing.endpoint = proxy.endpoint;
                }
                None => {
                    proxy.state = ProxyState::Active;
                    proxy.health_score = NEUTRAL_HEALTH;
                    proxy.consecutive_failures = 0;
                    proxy.cooldown_until = None;
                    proxy.cooldown_cycles = 0;
                    proxy.probation = false;
                    info!(proxy = %proxy.id, "Registered proxy");
                    state.proxies.push(proxy);
                    added += 1;
                }
            }
        }
        added
    }

    /// 解析并注册代理地址
    pub fn register_uris<S: AsRef<str>>(&self, uris: &[S]) -> Result<usize, ProxyError> {
        let records = uris
            .iter()
            .map(|u| ProxyRecord::parse(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.register(records))
    }

    /// 池中代理总数（含冷却和 DEAD）
    pub fn len(&self) -> usize {
        self.state.lock().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 选择一个代理
    ///
    /// 选择前先把冷却到期的代理恢复为 ACTIVE（试用期）。
    ///
    /// # 返回值
    ///
    /// * `Ok(ProxyRecord)` - 被选中代理的快照
    /// * `Err(ProxyError::Exhausted)` - 没有 ACTIVE 代理
    pub fn select(&self, strategy: RotationStrategy) -> Result<ProxyRecord, ProxyError> {
        self.select_with_rng(strategy, &mut rand::rng())
    }

    /// 使用指定随机源选择代理
    pub fn select_with_rng<R: Rng>(
        &self,
        strategy: RotationStrategy,
        rng: &mut R,
    ) -> Result<ProxyRecord, ProxyError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        promote_expired(&mut state.proxies, now);

        let active: Vec<usize> = state
            .proxies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == ProxyState::Active)
            .map(|(i, _)| i)
            .collect();

        if active.is_empty() {
            warn!(total = state.proxies.len(), "No active proxy available");
            return Err(ProxyError::Exhausted);
        }

        let chosen = match strategy {
            RotationStrategy::RoundRobin => {
                let idx = active[state.cursor % active.len()];
                state.cursor = state.cursor.wrapping_add(1);
                idx
            }
            RotationStrategy::Random => active[rng.random_range(0..active.len())],
            RotationStrategy::HealthBased => weighted_pick(&state.proxies, &active, rng),
        };

        let proxy = &mut state.proxies[chosen];
        proxy.last_selected = Some(now);
        debug!(proxy = %proxy.id, health = proxy.health_score, ?strategy, "Selected proxy");
        Ok(proxy.clone())
    }

    /// 记录一次请求结果
    ///
    /// 健康度按 EWMA 更新；连续失败达到阈值（或试用期内任一失败）时进入下一轮冷却，
    /// 冷却轮数超过上限后标记为 DEAD。成功会清零连续失败数与冷却轮数。
    ///
    /// # 返回值
    ///
    /// 代理更新后的状态
    pub fn record_outcome(
        &self,
        proxy_id: &str,
        success: bool,
        latency: Duration,
    ) -> Result<ProxyState, ProxyError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let proxy = state
            .proxies
            .iter_mut()
            .find(|p| p.id == proxy_id)
            .ok_or_else(|| ProxyError::UnknownProxy(proxy_id.to_string()))?;

        let alpha = self.config.ewma_alpha.clamp(0.0, 1.0);
        let signal = if success { 1.0 } else { 0.0 };
        proxy.health_score = (alpha * signal + (1.0 - alpha) * proxy.health_score).clamp(0.0, 1.0);

        proxy.latencies.push_back(latency);
        while proxy.latencies.len() > self.config.latency_window.max(1) {
            proxy.latencies.pop_front();
        }

        if success {
            proxy.success_count += 1;
            proxy.consecutive_failures = 0;
            proxy.cooldown_cycles = 0;
            proxy.probation = false;
            return Ok(proxy.state);
        }

        proxy.failure_count += 1;
        proxy.consecutive_failures += 1;

        let breached = proxy.probation
            || proxy.consecutive_failures >= self.config.failure_threshold.max(1);
        if proxy.state == ProxyState::Active && breached {
            proxy.probation = false;
            proxy.cooldown_cycles += 1;

            if proxy.cooldown_cycles > self.config.max_cooldown_cycles {
                proxy.state = ProxyState::Dead;
                proxy.cooldown_until = None;
                counter!("proxy_state_transitions_total", "to" => "dead").increment(1);
                warn!(proxy = %proxy.id, cycles = proxy.cooldown_cycles, "Proxy marked dead");
            } else {
                let duration = self.cooldown_duration(proxy.cooldown_cycles);
                proxy.state = ProxyState::Cooldown;
                // An unrepresentable cooldown keeps the proxy out of rotation for good
                proxy.cooldown_until = now.checked_add(duration);
                counter!("proxy_state_transitions_total", "to" => "cooldown").increment(1);
                warn!(
                    proxy = %proxy.id,
                    cycle = proxy.cooldown_cycles,
                    cooldown_secs = duration.as_secs(),
                    "Proxy entering cooldown"
                );
            }
        }

        Ok(proxy.state)
    }

    /// 第 n 轮冷却时长：base * 2^(n-1)，不超过上限
    fn cooldown_duration(&self, cycle: u32) -> Duration {
        let base = self.config.cooldown_base_secs;
        let exponent = cycle.saturating_sub(1).min(20);
        let secs = base.saturating_mul(1u64 << exponent);
        Duration::from_secs(secs.min(self.config.cooldown_max_secs.max(base)))
    }

    /// 代理池统计快照
    pub fn stats(&self) -> ProxyPoolStats {
        let mut state = self.state.lock();
        promote_expired(&mut state.proxies, Instant::now());

        let count = |s: ProxyState| state.proxies.iter().filter(|p| p.state == s).count();
        ProxyPoolStats {
            total: state.proxies.len(),
            active: count(ProxyState::Active),
            cooldown: count(ProxyState::Cooldown),
            dead: count(ProxyState::Dead),
            proxies: state.proxies.iter().map(ProxySnapshot::from).collect(),
        }
    }
}

fn promote_expired(proxies: &mut [ProxyRecord], now: Instant) {
    for proxy in proxies.iter_mut() {
        if proxy.state != ProxyState::Cooldown {
            continue;
        }
        if proxy.cooldown_until.is_some_and(|until| until <= now) {
            proxy.state = ProxyState::Active;
            proxy.cooldown_until = None;
            proxy.consecutive_failures = 0;
            proxy.probation = true;
            counter!("proxy_state_transitions_total", "to" => "active").increment(1);
            info!(proxy = %proxy.id, "Proxy cooldown expired, back on probation");
        }
    }
}

/// 按健康度加权抽样；权重全部相同（或全为 0）时选最久未使用的代理
fn weighted_pick<R: Rng>(proxies: &[ProxyRecord], active: &[usize], rng: &mut R) -> usize {
    let weights: Vec<f64> = active.iter().map(|&i| proxies[i].health_score.max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    let (min, max) = weights
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &w| (lo.min(w), hi.max(w)));

    if total <= f64::EPSILON || (max - min).abs() <= f64::EPSILON {
        return least_recently_used(proxies, active);
    }

    let mut target = rng.random::<f64>() * total;
    for (pos, weight) in weights.iter().enumerate() {
        if target < *weight {
            return active[pos];
        }
        target -= weight;
    }
    // Floating point leftovers land on the last candidate with weight
    active[weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)]
}

fn least_recently_used(proxies: &[ProxyRecord], active: &[usize]) -> usize {
    active
        .iter()
        .copied()
        .min_by_key(|&i| proxies[i].last_selected)
        .unwrap_or(active[0])
}
