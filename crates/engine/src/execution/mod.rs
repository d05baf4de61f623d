mod live;
mod simulated;

pub use live::LiveExecution;
pub use simulated::SimulatedExecution;
