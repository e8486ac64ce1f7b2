pub mod extractor;
pub mod model_client;
pub mod prompt;
