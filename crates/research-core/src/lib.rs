pub mod error;
pub mod normalize;
pub mod sectors;
pub mod traits;
pub mod types;

pub use error::*;
pub use sectors::*;
pub use traits::*;
pub use types::*;
