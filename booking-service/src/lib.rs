pub mod api;
pub mod conflicts;
pub mod fetch;
pub mod handlers;
pub mod ical;
pub mod memory;
pub mod models;
pub mod pricing;
pub mod schema;
pub mod store;
pub mod sync;
