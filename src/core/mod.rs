pub mod auth;
pub mod db;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod pagination;
pub mod repository;
pub mod server;
pub mod state;
pub mod upload;

pub use db::Database;
pub use error::{AppError, AppResult};
pub use hooks::{ModelChangeHook, RegenerateSlug};
pub use pagination::Pagination;
pub use repository::Repository;
pub use server::Server;
pub use state::AppState;
pub use upload::UploadStore;
