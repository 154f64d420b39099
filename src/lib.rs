pub mod app;
pub mod backup;
pub mod cli;
pub mod config;
pub mod database;
pub mod models;
pub mod seed;
pub mod stats;
pub mod utils;
pub mod validation;

pub use app::App;
pub use config::Config;
pub use database::Database;
pub use models::{Entry, Field, FieldType, FieldValue, GoalDirection, StoredImage, ViewConfiguration};
pub use utils::Profile;
