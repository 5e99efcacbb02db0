// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::prospect::ProspectRecord;
use crate::domain::models::validation::ValidationReport;
use crate::domain::repositories::export_repository::ExportRepository;
use crate::domain::services::validation_service::ValidationService;
use crate::utils::errors::ExportError;
use std::sync::Arc;
use tracing::{info, warn};

/// 导出潜在客户用例
///
/// 先校验整个数据集，再把记录和报告一起交给导出器。严格模式下
/// 任意一条无效记录都会阻止导出；建议模式下全部导出，由报告告知问题。
pub struct ExportProspectsUseCase {
    validator: Arc<ValidationService>,
    exporter: Arc<dyn ExportRepository>,
}

impl ExportProspectsUseCase {
    pub fn new(validator: Arc<ValidationService>, exporter: Arc<dyn ExportRepository>) -> Self {
        Self {
            validator,
            exporter,
        }
    }

    /// 校验并导出
    ///
    /// # 返回值
    ///
    /// * `Ok(ValidationReport)` - 已导出，附校验报告
    /// * `Err(ExportError::Blocked)` - 严格模式下存在无效记录，未导出任何内容
    /// * `Err(ExportError::Exporter)` - 导出器失败
    pub async fn execute(&self, records: &[ProspectRecord]) -> Result<ValidationReport, ExportError> {
        let report = self.validator.validate_dataset(records);

        if report.blocks_export() {
            warn!(
                invalid = report.invalid,
                total = report.total,
                "Export blocked by strict validation"
            );
            return Err(ExportError::Blocked {
                invalid: report.invalid,
                total: report.total,
            });
        }

        self.exporter.export(records, &report).await?;
        info!(
            exported = records.len(),
            invalid = report.invalid,
            "Prospects exported"
        );
        Ok(report)
    }
}
