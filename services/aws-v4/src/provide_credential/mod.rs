mod assume_role;
pub use assume_role::{
    AssumeRoleCredentialProvider, DEFAULT_DURATION_SECONDS, DEFAULT_ROLE_SESSION_NAME,
};

mod r#static;
pub use r#static::StaticCredentialProvider;
