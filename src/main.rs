use anyhow::{Context, Result};
use batch_core::logging::init_logging;
use batch_core::{AppConfig, DatabaseConfig};
use batch_domain::BatchRepository;
use batch_infrastructure::DatabaseManager;
use clap::{Parser, Subcommand};
use tracing::info;

/// 批处理存储管理工具
#[derive(Parser, Debug)]
#[command(name = "batch-db")]
#[command(version)]
#[command(about = "批处理作业存储与依赖图管理")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 数据库凭据文件 (JSON)，覆盖配置中的 database.url
    #[arg(long, value_name = "FILE")]
    credentials: Option<String>,

    /// 日志级别 (覆盖配置文件)
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式 (覆盖配置文件)
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty", "text"])]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 创建 batch、jobs 与 jobs-parents 表
    Migrate,
    /// 检查数据库连接
    Health,
    /// 列出已删除且全部作业完成的批次
    GcCandidates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(path) = &cli.credentials {
        config.database.url = DatabaseConfig::from_credentials_file(path)?.url;
    }
    init_logging(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.log_format.as_deref().unwrap_or(&config.logging.format),
    )?;

    let manager = DatabaseManager::new(&config)
        .await
        .context("连接数据库失败")?;

    let result = run(&cli.command, &manager).await;
    manager.close().await;
    result
}

async fn run(command: &Commands, manager: &DatabaseManager) -> Result<()> {
    match command {
        Commands::Migrate => {
            manager.migrate().await?;
            println!("数据库迁移完成");
        }
        Commands::Health => {
            manager.health_check().await?;
            println!("数据库连接正常 ({:?})", manager.database_type());
        }
        Commands::GcCandidates => {
            let batches = manager.batches().get_finished_deleted().await?;
            info!(count = batches.len(), "查询可回收批次");
            for batch in batches {
                println!(
                    "{}\t{}\t{}/{}",
                    batch.id, batch.user, batch.n_completed, batch.n_jobs
                );
            }
        }
    }
    Ok(())
}
