pub mod renderer;

pub use renderer::{page_context, ThemeRenderer};
