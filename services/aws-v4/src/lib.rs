//! AWS SigV4 signing and STS role assumption.
//!
//! This crate provides:
//!
//! - [`RequestSigner`]: header based AWS Signature Version 4.
//! - [`StaticCredentialProvider`]: credentials taken as configured.
//! - [`StsClient`] and [`AssumeRoleCredentialProvider`]: temporary credentials obtained by
//!   assuming a role through the AWS Security Token Service.
//!
//! ## Example
//!
//! ```no_run
//! use sigv4_bridge_aws_v4::{RequestSigner, StaticCredentialProvider};
//! use sigv4_bridge_core::{Context, Result, Signer};
//!
//! # async fn example(ctx: Context) -> Result<()> {
//! let signer = Signer::new(
//!     ctx,
//!     StaticCredentialProvider::new("access_key_id", "secret_access_key"),
//!     RequestSigner::new("execute-api", "us-east-1"),
//! );
//!
//! let (mut parts, _) = http::Request::get("https://api.example.com/data")
//!     .body(())?
//!     .into_parts();
//! signer.sign(&mut parts).await?;
//! # Ok(())
//! # }
//! ```

mod constants;
pub use constants::{
    AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN, X_AMZ_CONTENT_SHA_256,
    STS_SERVICE, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};

mod credential;
pub use credential::Credential;

mod sign_request;
pub use sign_request::RequestSigner;

mod sts;
pub use sts::{sts_endpoint, AssumeRoleInput, AssumeRoleOutput, StsClient, StsCredentials};

mod provide_credential;
pub use provide_credential::{
    AssumeRoleCredentialProvider, StaticCredentialProvider, DEFAULT_DURATION_SECONDS,
    DEFAULT_ROLE_SESSION_NAME,
};
