// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理抓取引擎的配置设置，包括代理池、限流、缓存、重试与数据校验
pub mod settings;
