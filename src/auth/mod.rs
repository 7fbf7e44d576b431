//! Bearer token issuing and verification.

mod token;
pub use token::{HmacTokenSigner, TokenSigner};
