pub mod call;
pub mod constants;
pub mod error;
pub mod params;
pub mod participant;
pub mod types;

pub use call::*;
pub use constants::*;
pub use error::FreezerError;
pub use params::FreezerParams;
pub use participant::*;
pub use types::*;
