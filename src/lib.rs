pub mod bitmap;
pub mod encoding;
pub mod error;
pub mod position;
pub mod stream;
