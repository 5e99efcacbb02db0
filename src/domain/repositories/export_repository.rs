// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::prospect::ProspectRecord;
use crate::domain::models::validation::ValidationReport;
use crate::utils::errors::ExportError;
use async_trait::async_trait;

/// 导出仓库特质
///
/// 由外部协作方实现（CSV、JSON、表格等），核心自身从不写文件。
/// 实现方失败时返回 `ExportError::Exporter`。
#[async_trait]
pub trait ExportRepository: Send + Sync {
    /// 导出记录及其校验报告
    async fn export(
        &self,
        records: &[ProspectRecord],
        report: &ValidationReport,
    ) -> Result<(), ExportError>;
}
