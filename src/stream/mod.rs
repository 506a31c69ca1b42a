mod input;
mod output;

pub use input::{InputStream, SeekableArrayInputStream};
pub use output::{BufferedOutputStream, OutputStream};
