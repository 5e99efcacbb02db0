// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由调用方提供：
/// - 导出仓库（export_repository）：接收校验后的记录与报告并负责序列化
pub mod export_repository;
