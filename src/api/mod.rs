// API module
//
// HTTP surface of a node: thin handlers over the ledger engine

pub mod doc;
pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use doc::ApiDoc;
pub use handlers::AppState;
pub use routes::configure_routes;
