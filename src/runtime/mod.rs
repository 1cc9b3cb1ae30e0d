pub mod marshal;
pub mod task;

pub use marshal::{Marshal, MarshalPump};
pub use task::TaskRunner;
