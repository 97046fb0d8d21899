pub mod api;
pub mod cube;
pub mod dates;
pub mod db;
pub mod errors;
pub mod logging;
pub mod query;
pub mod taxonomy;
pub mod tfidf;
pub mod trend;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
