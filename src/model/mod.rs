mod event;
mod results;
mod standings;

pub use event::*;
pub use results::*;
pub use standings::*;
