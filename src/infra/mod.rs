mod archive;
mod legacy;
mod opencode_db;
mod overrides;
mod store;

pub use archive::*;
pub use legacy::*;
pub use opencode_db::*;
pub use overrides::*;
pub use store::*;
