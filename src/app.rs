use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::seed;

/// Everything a command needs: the loaded configuration and an open,
/// initialized database. Built once per process.
pub struct App {
    pub config: Config,
    pub db: Database,
}

impl App {
    /// Open the configured database and run pending start-up tasks
    pub fn init(config: Config) -> Result<Self, DatabaseError> {
        let db_path = config.get_database_path();
        let db = Database::new(&db_path.to_string_lossy())?;
        Self::with_database(config, db)
    }

    /// Wrap an already open database, running pending start-up tasks
    pub fn with_database(config: Config, db: Database) -> Result<Self, DatabaseError> {
        seed::run_startup_tasks(&db)?;
        tracing::debug!(path = %config.database_path, "database ready");
        Ok(Self { config, db })
    }
}
