//! Access token model.

pub mod record;
pub mod secret;
