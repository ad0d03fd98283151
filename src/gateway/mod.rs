//! Gateway implementations

mod builder;
pub mod fallback;
pub mod orchestrator;

pub use builder::{Larder, LarderBuilder};
pub use fallback::{RecipeService, RecipeSource, Sourced};
pub use orchestrator::{CacheTtls, RecipeGateway};
