// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use scrapemaster::application::scraper::Scraper;
use scrapemaster::config::settings::Settings;
use scrapemaster::domain::models::task::RequestTask;
use scrapemaster::infrastructure::metrics::init_metrics;
use scrapemaster::utils::telemetry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

/// 主函数
///
/// 从标准输入读取 JSON 任务数组，抓取后把 JSON 结果数组写到标准输出。
/// Ctrl-C 会取消作业，已开始的任务以 `cancelled` 结束。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting scrapemaster...");

    // 2. Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    info!("Configuration loaded");

    if let Some(addr) = &settings.metrics.exporter_addr {
        init_metrics(addr)?;
    }

    // 3. Assemble components
    let scraper = Scraper::from_settings(&settings)?;

    // 4. Read tasks
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read tasks from stdin")?;
    let tasks: Vec<RequestTask> =
        serde_json::from_str(&input).context("Expected a JSON array of tasks on stdin")?;
    info!(tasks = tasks.len(), "Tasks loaded");

    let cancel = scraper.engine().cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling job");
            cancel.cancel();
        }
    });

    // 5. Run and emit results
    let results = scraper.scrape_batch(tasks).await;
    let output = serde_json::to_vec_pretty(&results)?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    let stats = scraper.cache_stats();
    info!(
        results = results.len(),
        succeeded = results.iter().filter(|r| r.success).count(),
        cache_hit_rate = stats.hit_rate(),
        "Done"
    );
    Ok(())
}
