mod chat_model;
pub use chat_model::*;

mod error;
pub use error::*;

mod openai;
pub use openai::*;
