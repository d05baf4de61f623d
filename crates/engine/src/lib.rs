pub mod backfill;
pub mod bus;
pub mod connector;
pub mod dispatcher;
pub mod execution;

pub use backfill::RestBackfill;
pub use bus::{Bus, BusHandle};
pub use connector::{BookConnector, ConnectorState};
pub use dispatcher::Dispatcher;
pub use execution::{LiveExecution, SimulatedExecution};
