pub mod chat;
pub mod emails;
pub mod system;

pub use chat::*;
pub use emails::*;
pub use system::*;
