// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了抓取引擎的核心实体，包括：
/// - 代理（proxy）：代理记录、状态与轮换策略
/// - 选择器（selector）：带显式种类的字段选择器
/// - 任务（task）：一次抓取请求
/// - 抓取结果（scrape_result）：每个任务唯一的结果
/// - 潜在客户（prospect）：校验器的输入记录
/// - 校验报告（validation）：数据集校验的输出
pub mod proxy;
pub mod prospect;
pub mod scrape_result;
pub mod selector;
pub mod task;
pub mod validation;
