// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：核心业务实体和数据结构
/// - 仓库接口（repositories）：导出等外部协作方的抽象接口
/// - 服务（services）：字段提取与数据校验
///
/// 领域层不依赖于网络和任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
