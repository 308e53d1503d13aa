pub mod errors;
pub mod initializer;
pub mod models;
pub mod persist;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod write_behind;

pub use errors::*;
pub use initializer::*;
pub use models::*;
pub use persist::*;
pub use recorder::*;
pub use scheduler::*;
pub use session::*;
pub use store::*;
pub use write_behind::*;
