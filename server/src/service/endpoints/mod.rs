//! Endpoint handlers organized by domain

pub mod catalog;
pub mod events;
pub mod progress;
pub mod session;

pub use catalog::CatalogEndpoints;
pub use events::EventsEndpoints;
pub use progress::ProgressEndpoints;
pub use session::SessionEndpoints;
