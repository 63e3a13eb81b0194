use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod migration;
pub mod records;
pub mod token_crypto;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use migration::{
    MigrationConfig, MigrationCounters, MigrationErrorEntry, MigrationErrorKind, MigrationPhase,
    MigrationStatus, Platform, ProductStatus,
};
pub use records::{
    DiscountKind, MigrationCollection, MigrationCoupon, MigrationCustomer,
    MigrationCustomerAddress, MigrationImage, MigrationOrder, MigrationOrderItem,
    MigrationProduct, MigrationVariant, OrderStatus, PaymentMethod, PaymentStatus,
};
pub use token_crypto::TokenCipher;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Errors from encrypting or decrypting stored OAuth tokens.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("token key is not valid base64: {0}")]
    KeyEncoding(String),

    #[error("token key must be 32 bytes after base64 decoding, got {0}")]
    KeyLength(usize),

    #[error("ciphertext is not valid base64: {0}")]
    CiphertextEncoding(String),

    #[error("ciphertext is too short to contain a nonce")]
    CiphertextTruncated,

    #[error("AEAD {0} failed")]
    Aead(&'static str),

    #[error("decrypted token is not valid UTF-8")]
    Utf8,
}
