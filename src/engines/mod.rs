// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 抓取引擎模块
///
/// 静态抓取、浏览器渲染、页面检测与任务编排
pub mod chromium_renderer;
pub mod detector;
pub mod headers;
pub mod reqwest_engine;
pub mod scrape_engine;
pub mod traits;
