pub mod panic_watcher;
pub mod state;

pub use panic_watcher::PanicWatcher;
pub use state::{Portfolio, PortfolioView};
