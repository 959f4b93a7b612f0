//! HTTP request handlers.

pub mod images;
pub mod ping;
pub mod repositories;

pub use images::*;
pub use ping::*;
pub use repositories::*;
