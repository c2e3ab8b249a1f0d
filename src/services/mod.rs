pub mod assist;
pub mod cookies;
pub mod error;
pub mod oauth;
pub mod social;
pub mod tokens;
