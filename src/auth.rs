//! Identity-side models: identifiers, decoded identity tokens, users, and cached tokens.

pub mod id;
pub mod id_token;
pub mod token;
pub mod user;

pub use id::*;
pub use id_token::*;
pub use token::{grant::*, record::*, secret::*};
pub use user::*;
