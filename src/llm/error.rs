use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("OpenAI error: {0}")]
    OpenAIError(#[from] OpenAIError),

    #[error("No completion choice in response")]
    ContentNotFound,

    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error(
        "No LLM configuration found. Set LOCAL_LLM_URL for an OpenAI-compatible \
         endpoint or OPENAI_API_KEY for the hosted API."
    )]
    MissingConfiguration,
}
