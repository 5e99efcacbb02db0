// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 抓取引擎共享的有状态组件，均在内部同步，调用方无需额外加锁：
/// - 缓存（cache）：响应缓存
/// - 代理（proxy）：代理池与健康度管理
/// - 限流（rate_limit）：按主机的令牌桶
/// - 指标（metrics）：可选的 Prometheus 导出器
pub mod cache;
pub mod metrics;
pub mod proxy;
pub mod rate_limit;
