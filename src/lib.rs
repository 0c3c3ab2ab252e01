//! gainengine - Rotating strength plan with automated progressive overload
//!
//! Every completed session is logged per exercise; once an exercise has been
//! done enough times in a row at one weight, the weight goes up.

pub mod coach;
pub mod db;
pub mod engine;
pub mod error;
pub mod manager;
pub mod model;
pub mod plan;
pub mod schema;
pub mod settings;
pub mod transaction;
pub mod tui;

pub use db::{Database, PersistenceGateway, SqliteGateway};
pub use error::WorkoutError;
pub use manager::WorkoutManager;
