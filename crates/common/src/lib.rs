//! Common utilities and shared types for vitrine.
//!
//! This crate provides foundational components used across all vitrine crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Cryptography**: RSA key generation for `ActivityPub` signatures
//! - **HTTP Signatures**: the signature header codec and canonical signing string
//! - **ID Generation**: snowflake-style sortable identifiers via [`IdGenerator`]
//! - **Storage**: media storage backends for cached remote avatars and headers
//!
//! # Example
//!
//! ```no_run
//! use vitrine_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     println!("{} starts at {}", config.server.url, id_gen.generate());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod http_signature;
pub mod id;
pub mod storage;

pub use config::Config;
pub use crypto::{RsaKeypair, generate_rsa_keypair};
pub use error::{AppError, AppResult};
pub use http_signature::{
    SignatureError, SignatureHeader, body_hash, build_signing_string, calculate_digest,
};
pub use id::IdGenerator;
pub use storage::{LocalMediaStore, MediaStore, StoredMedia};
