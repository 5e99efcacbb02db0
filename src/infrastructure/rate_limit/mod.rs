// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 限流模块
///
/// 按目标主机划分的令牌桶，惰性补充
pub mod token_bucket;
