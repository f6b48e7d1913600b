//! Sign a request with AWS SigV4, optionally after assuming a role, and send it.
//!
//! One [`Bridge`] serves every invocation of a process:
//!
//! ```no_run
//! use sigv4_bridge::Bridge;
//! use sigv4_bridge_core::{Context, OsEnv};
//! use sigv4_bridge_http_send_reqwest::ReqwestHttpSend;
//!
//! # async fn example() -> sigv4_bridge_core::Result<()> {
//! let ctx = Context::new()
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! let bridge = Bridge::from_env(ctx)?;
//!
//! let resp = bridge.handle(&(), &()).await?;
//! println!("{} {}", resp.status_code, resp.body);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
pub use config::{
    Config, DEFAULT_SIGNING_SERVICE, REQUEST_METHOD, ROLE_ARN, SIGNING_SERVICE, STS_ENDPOINT,
    TARGET_AWS_REGION, URL,
};

mod services;
pub use services::{ServiceCache, Services};

mod source;
pub use source::{CredentialSet, CredentialSource};

mod request;
pub use request::RequestDescriptor;

mod execute;
pub use execute::{execute, Response};

mod bridge;
pub use bridge::Bridge;
