pub mod models;
pub mod paths;
pub mod store;
