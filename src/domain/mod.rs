mod extract;
mod format;
mod parse;
mod snippet;
mod types;

pub use extract::*;
pub use format::*;
pub use parse::*;
pub use snippet::*;
pub use types::*;
