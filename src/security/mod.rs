//! Security primitives for remo.
//!
//! This module provides the building blocks both entry points (bot commands
//! and dashboard routes) are guarded with.
//!
//! ## Features
//!
//! - **Rate Limiting**: per-key sliding window limiter
//! - **Credentials**: constant-time pair check, argon2 hashing
//! - **Sessions**: HMAC-signed, self-contained, expiring tokens
//! - **CSRF**: per-session anti-forgery tokens
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use remo::security::{Claims, CsrfGuard, RateLimitConfig, SessionCodec, SigningKey, SlidingWindowLimiter};
//!
//! // 5 login attempts per 15 minutes per IP
//! let limiter = SlidingWindowLimiter::new(RateLimitConfig::login());
//! assert!(limiter.allow(&"1.2.3.4".to_string()));
//!
//! let codec = SessionCodec::new(&SigningKey::generate(), Duration::from_secs(3600)).unwrap();
//! let csrf = CsrfGuard::default();
//! let mut claims = Claims::new();
//! let token = csrf.attach(&mut claims);
//!
//! let session = codec.issue(claims).unwrap();
//! let claims = codec.verify(&session).unwrap();
//! assert!(csrf.verify(&claims, &token));
//! ```

pub mod credentials;
pub mod csrf;
pub mod keys;
pub mod rate_limit;
pub mod session;

// Re-export commonly used types
pub use credentials::{hash_secret, validate_credentials_blocking, verify_hash, CredentialValidator};
pub use csrf::{CsrfGuard, CSRF_CLAIM};
pub use keys::{load_or_create_secret, SigningKey};
pub use rate_limit::{RateLimitConfig, RateLimitStats, SlidingWindowLimiter};
pub use session::{Claims, SessionCodec, SessionError};
