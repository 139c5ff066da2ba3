//! Generative backend access and response parsing.

pub mod client;
pub mod extract;

pub use client::{GenerationRequest, Generator, OllamaClient};
