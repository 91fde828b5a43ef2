//! TCP side of the bridge: a fixed pool of client slots fed by a listener.

pub mod mock;
pub mod net;
pub mod pool;
pub mod traits;

pub use mock::{MockConnection, MockListener};
pub use net::{NetConnection, NetListener};
pub use pool::{ClientPool, SlotState};
pub use traits::{Connection, Listener};
