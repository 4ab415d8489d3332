pub mod state;
pub mod surfaces;
pub mod sync;

pub use state::*;
pub use surfaces::*;
pub use sync::*;
