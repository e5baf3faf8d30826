//! Token values handed to callers and read back from the persistent cache.

pub mod grant;
pub mod record;
pub mod secret;
