pub mod config;
pub mod error;
pub mod language;
pub mod models;
pub mod signature;
pub mod text;
pub mod voices;

pub use error::{AppError, Result};
pub use language::{Formality, Language};
pub use models::{AudioAsset, InboundEvent, OutboundMessage, OutboundReply, WebhookBody};
