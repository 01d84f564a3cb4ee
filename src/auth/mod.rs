//! Client-credentials authentication.

mod token;

pub use token::{Credentials, REFRESH_MARGIN, TokenManager, TokenState};
