use crate::core::{AppState, Server};
use crate::models::Config;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 覆盖配置中的数据库连接串
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 启动 Web 服务器
    Serve(ServeArgs),

    /// 创建数据表
    Migrate,

    /// 创建角色
    CreateRole(CreateRoleArgs),

    /// 创建用户
    CreateUser(CreateUserArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// 监听地址，例如 127.0.0.1:5000
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct CreateRoleArgs {
    /// 角色名称
    #[arg(short, long)]
    pub name: String,

    /// 角色描述
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct CreateUserArgs {
    /// 登录邮箱
    #[arg(short, long)]
    pub email: String,

    /// 明文密码，保存前会被哈希
    #[arg(short, long)]
    pub password: String,

    /// 关联的角色，可重复
    #[arg(short, long = "role")]
    pub roles: Vec<String>,

    /// 创建为未激活用户
    #[arg(long)]
    pub inactive: bool,
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::from_env().context("加载配置失败")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command {
        Commands::Serve(args) => {
            if let Some(addr) = args.bind {
                config.bind_addr = addr;
            }
            let state = AppState::init(config).await?;
            Server::new(state).start().await?;
        }
        Commands::Migrate => {
            let state = AppState::init(config).await?;
            info!("Database schema is up to date");
            state.shutdown().await;
        }
        Commands::CreateRole(args) => {
            let state = AppState::init(config).await?;
            let role = state
                .repo
                .create_role(&args.name, args.description.as_deref())
                .await;
            state.shutdown().await;
            let role = role?;
            println!("已创建角色: {} (id {})", role.name, role.id);
        }
        Commands::CreateUser(args) => {
            let state = AppState::init(config).await?;
            let hash = state.hasher.hash(&args.password)?;
            let user = state
                .repo
                .create_user(&args.email, &hash, !args.inactive, &args.roles)
                .await;
            state.shutdown().await;
            let user = user?;
            println!("已创建用户: {} (id {})", user.email, user.id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_user_with_roles() {
        let cli = Cli::parse_from([
            "blog-cms",
            "create-user",
            "--email",
            "admin@example.com",
            "--password",
            "secret",
            "--role",
            "admin",
            "--role",
            "editor",
        ]);
        match cli.command {
            Commands::CreateUser(args) => {
                assert_eq!(args.email, "admin@example.com");
                assert_eq!(args.roles, vec!["admin", "editor"]);
                assert!(!args.inactive);
            }
            _ => panic!("expected create-user"),
        }
    }

    #[test]
    fn serve_accepts_bind_and_database_override() {
        let cli = Cli::parse_from([
            "blog-cms",
            "serve",
            "--bind",
            "127.0.0.1:8080",
            "--database-url",
            "sqlite::memory:",
        ]);
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, Some("127.0.0.1:8080".parse().unwrap()));
            }
            _ => panic!("expected serve"),
        }
    }
}
