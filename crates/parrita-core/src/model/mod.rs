mod call;
mod conversation;

pub use call::*;
pub use conversation::*;
