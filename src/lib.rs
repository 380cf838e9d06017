pub mod admin;
pub mod blog;
pub mod cli;
pub mod core;
pub mod models;
pub mod theme;
pub mod utils;

// Re-export commonly used types and traits
pub use crate::core::{AppError, AppState, ModelChangeHook, Repository, Server};
pub use crate::models::{Article, Config, Post, Role, Sluggable, Tag, User};
pub use crate::theme::ThemeRenderer;
