pub mod caching;
pub mod listeners;
pub mod registry;
pub mod store;
