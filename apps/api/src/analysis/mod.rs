// Resume analysis: PDF text extraction, model call strategies, and the
// normalizer that turns whatever the model returns into a complete record.

pub mod extract;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod schema;
