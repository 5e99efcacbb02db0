// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 对外的抓取门面与导出用例
pub mod scraper;
pub mod usecases;
