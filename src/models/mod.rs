pub mod config;
pub mod types;

pub use config::{Config, ConfigError, PasswordScheme};
pub use types::{
    Article, ArticleChanges, Post, PostChanges, Role, Sluggable, Tag, User,
};
