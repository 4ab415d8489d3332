pub mod format;
pub mod models;
pub mod traits;

pub use format::*;
pub use models::*;
pub use traits::*;
