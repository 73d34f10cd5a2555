mod event;
mod fanout;

pub use event::*;
pub use fanout::*;
