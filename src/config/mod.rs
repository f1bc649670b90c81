mod keychain;
mod settings;

pub use keychain::KeychainManager;
pub use settings::{AppConfig, DEFAULT_RPC_URL};
