// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 单条记录的校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValidation {
    /// 在数据集中的位置
    pub index: usize,
    pub company: String,
    pub is_valid: bool,
    /// 违规项，任意一项都使记录无效
    pub violations: Vec<String>,
    /// 警告，不影响有效性
    pub warnings: Vec<String>,
    /// 0-100 的置信度
    pub confidence: u8,
}

/// 数据集汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// 有效记录百分比
    pub pass_rate: f64,
    /// 无效记录百分比
    pub error_rate: f64,
    /// 是否包含被明确禁止的来源或伪造数据
    pub has_prohibited_data: bool,
}

/// 校验报告
///
/// 每次校验重新生成，核心不做持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub records: Vec<RecordValidation>,
    pub summary: ValidationSummary,
    /// 为 true 时调用方必须在存在无效记录时阻止导出
    pub strict_mode: bool,
}

impl ValidationReport {
    /// 无效记录的校验详情
    pub fn invalid_records(&self) -> impl Iterator<Item = &RecordValidation> {
        self.records.iter().filter(|r| !r.is_valid)
    }

    /// 严格模式下是否应阻止导出
    pub fn blocks_export(&self) -> bool {
        self.strict_mode && self.invalid > 0
    }
}
