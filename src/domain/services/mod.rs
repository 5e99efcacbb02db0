// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含纯粹的业务逻辑，不做任何网络 I/O：
/// - 提取服务（extraction_service）：按选择器从文档中提取字段
/// - 校验服务（validation_service）：按"只接受真实数据"策略检查记录
pub mod extraction_service;
pub mod validation_service;
