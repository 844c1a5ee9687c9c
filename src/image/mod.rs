//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::{ImageProvider, ProviderFactory};
pub use types::{
    AspectRatio, GenerationResult, ImageFormat, OutputConfig, Resolution, ResponsePart,
};
