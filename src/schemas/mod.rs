mod message;
pub use message::*;

mod tool_call;
pub use tool_call::*;

mod token_usage;
pub use token_usage::*;
