mod capability;
pub use capability::*;

mod client;
pub use client::*;

mod error;
pub use error::*;

mod tool;
pub use tool::*;
