// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ProxyError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// 代理协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks5,
    /// 由代理端解析域名的 SOCKS5
    Socks5h,
}

impl ProxyProtocol {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks5" => Some(ProxyProtocol::Socks5),
            "socks5h" => Some(ProxyProtocol::Socks5h),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Socks5h => "socks5h",
        }
    }
}

/// 代理状态
///
/// ACTIVE → COOLDOWN → ACTIVE（冷却到期）→ … → DEAD（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyState {
    Active,
    Cooldown,
    Dead,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyState::Active => write!(f, "active"),
            ProxyState::Cooldown => write!(f, "cooldown"),
            ProxyState::Dead => write!(f, "dead"),
        }
    }
}

/// 代理轮换策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// 在活跃代理上循环
    RoundRobin,
    /// 均匀随机
    Random,
    /// 按健康度加权随机，权重相同时选最久未使用的
    #[default]
    HealthBased,
}

/// 代理记录
///
/// 只能由 `ProxyManager` 修改；`select` 返回的是快照副本。
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    /// 脱敏后的标识 `scheme://host:port`，用于日志与统计
    pub id: String,
    /// 完整地址（含认证信息）
    pub endpoint: String,
    pub protocol: ProxyProtocol,
    /// 健康度，0 到 1 的指数加权平均
    pub health_score: f64,
    pub consecutive_failures: u32,
    pub state: ProxyState,
    pub cooldown_until: Option<Instant>,
    /// 未被成功打断的冷却轮数
    pub cooldown_cycles: u32,
    /// 冷却刚结束，下一次结果决定去留
    pub probation: bool,
    /// 最近的延迟采样
    pub latencies: VecDeque<Duration>,
    pub last_selected: Option<Instant>,
    pub success_count: u64,
    pub failure_count: u64,
}

/// 新代理的初始健康度
pub const NEUTRAL_HEALTH: f64 = 0.5;

impl ProxyRecord {
    /// 解析代理地址
    ///
    /// 支持 `http`、`https`、`socks5`、`socks5h`，必须包含主机名
    pub fn parse(uri: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(uri.trim()).map_err(|_| ProxyError::InvalidUri(redact(uri)))?;
        let protocol = ProxyProtocol::from_scheme(url.scheme())
            .ok_or_else(|| ProxyError::InvalidUri(redact(uri)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::InvalidUri(redact(uri)))?;
        let port = url
            .port_or_known_default()
            .or(match protocol {
                ProxyProtocol::Socks5 | ProxyProtocol::Socks5h => Some(1080),
                _ => None,
            })
            .ok_or_else(|| ProxyError::InvalidUri(redact(uri)))?;

        Ok(Self {
            id: format!("{}://{}:{}", protocol.as_str(), host, port),
            endpoint: uri.trim().to_string(),
            protocol,
            health_score: NEUTRAL_HEALTH,
            consecutive_failures: 0,
            state: ProxyState::Active,
            cooldown_until: None,
            cooldown_cycles: 0,
            probation: false,
            latencies: VecDeque::new(),
            last_selected: None,
            success_count: 0,
            failure_count: 0,
        })
    }

    pub fn total_requests(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }

    /// 平均延迟（毫秒），没有采样时为 None
    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        let sum: f64 = self.latencies.iter().map(|d| d.as_micros() as f64 / 1000.0).sum();
        Some(sum / self.latencies.len() as f64)
    }
}

// Invalid URIs may still carry credentials; keep only the scheme for the error
fn redact(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, _)) => format!("{}://<redacted>", scheme),
        None => "<unparseable>".to_string(),
    }
}

/// 单个代理的统计快照
#[derive(Debug, Clone, Serialize)]
pub struct ProxySnapshot {
    pub id: String,
    pub state: ProxyState,
    pub health_score: f64,
    pub success_rate: f64,
    pub avg_latency_ms: Option<f64>,
    pub total_requests: u64,
    pub cooldown_cycles: u32,
}

impl From<&ProxyRecord> for ProxySnapshot {
    fn from(record: &ProxyRecord) -> Self {
        Self {
            id: record.id.clone(),
            state: record.state,
            health_score: record.health_score,
            success_rate: record.success_rate(),
            avg_latency_ms: record.avg_latency_ms(),
            total_requests: record.total_requests(),
            cooldown_cycles: record.cooldown_cycles,
        }
    }
}

/// 代理池统计
#[derive(Debug, Clone, Serialize)]
pub struct ProxyPoolStats {
    pub total: usize,
    pub active: usize,
    pub cooldown: usize,
    pub dead: usize,
    pub proxies: Vec<ProxySnapshot>,
}
