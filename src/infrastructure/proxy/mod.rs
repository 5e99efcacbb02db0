// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 代理模块
///
/// 代理池、健康度评分与轮换策略
pub mod proxy_manager;
