pub mod config;
pub mod executor;
pub mod export;
pub mod fetch;
pub mod harvest;
pub mod model;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use export::*;
pub use fetch::*;
pub use model::*;
pub use traits::*;
