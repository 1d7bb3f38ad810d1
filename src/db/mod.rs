pub mod error;
pub mod memory;
pub mod mongo;
pub mod repo;

use std::sync::Arc;

use rocket::fairing::AdHoc;

use crate::config::{Config, StoreBackend};

pub use error::DbError;
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use repo::Store;

pub type DbConn = Arc<dyn Store>;

pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("Store", |rocket| async {
        match connect().await {
            Ok(store) => Ok(rocket.manage(store)),
            Err(e) => {
                log::error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

async fn connect() -> Result<DbConn, DbError> {
    match Config::store_backend() {
        StoreBackend::Memory => {
            if !Config::is_development() {
                log::warn!("In-memory store selected outside development; data will not survive a restart");
            }
            log::info!("✓ Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::MongoDb => {
            let store = MongoStore::connect(&Config::mongodb_uri(), &Config::database_name()).await?;
            log::info!("✓ MongoDB connected successfully");
            Ok(Arc::new(store))
        }
    }
}
