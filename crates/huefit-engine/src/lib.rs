pub mod adjust;
pub mod dryrun;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod intake;
pub mod studio;

pub use dryrun::DryrunGateway;
pub use error::GatewayError;
pub use gateway::TryOnGateway;
pub use gemini::GeminiGateway;
pub use studio::Studio;
