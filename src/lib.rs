pub mod auth;
pub mod db;
pub mod import;
pub mod lists;
pub mod progress;
pub mod routes;

use progress::ProgressTracker;

#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
    pub progress: ProgressTracker,
}
