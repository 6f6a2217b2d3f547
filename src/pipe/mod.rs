mod filter;
mod inspect;
mod progress;
mod windowed;

pub use filter::filter;
pub use inspect::inspect;
pub use progress::{Progress, format_count, progress};
pub use windowed::windowed;
