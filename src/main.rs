use anyhow::Result;
use blog_cms::cli;
use blog_cms::models::config::truthy;
use clap::Parser;
use colored::Colorize;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 先加载 .env，日志级别可能来自其中的 DEBUG
    dotenv::dotenv().ok();

    // 初始化日志系统
    let debug = std::env::var("DEBUG").map(|v| truthy(&v)).unwrap_or(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    fmt().with_target(false).with_env_filter(filter).init();

    // 解析命令行参数
    let cli = cli::Cli::parse();

    // 打印欢迎信息
    println!("{}", "
 ____  _               ____ __  __ ____
| __ )| | ___   __ _  / ___|  \\/  / ___|
|  _ \\| |/ _ \\ / _` || |   | |\\/| \\___ \\
| |_) | | (_) | (_| || |___| |  | |___) |
|____/|_|\\___/ \\__, | \\____|_|  |_|____/
               |___/
    ".bright_cyan());

    println!("{} {}", "Blog-CMS".bright_cyan(), env!("CARGO_PKG_VERSION").bright_green());
    println!("{}", "Posts, articles and tags with an admin console".bright_white());
    println!();

    // 执行命令
    if let Err(e) = cli::execute(cli).await {
        error!("Error: {}", e);

        // 打印错误链
        let mut source = e.source();
        while let Some(e) = source {
            error!("Caused by: {}", e);
            source = e.source();
        }

        std::process::exit(1);
    }

    Ok(())
}
