//! Remote completion providers.

pub mod openai;
