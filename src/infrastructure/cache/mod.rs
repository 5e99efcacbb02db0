// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 进程内的响应缓存，容量与 TTL 双重约束
pub mod response_cache;
