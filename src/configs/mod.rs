pub mod base;
pub mod encoder;
pub mod logging;
pub mod stream;
pub mod tempo;

pub use base::*;
pub use encoder::*;
pub use logging::*;
pub use stream::*;
pub use tempo::*;
