//! Serial transport: device access and the pump that feeds the bridge.

pub mod error;
pub mod mock;
pub mod pump;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use pump::{PumpStats, SerialPump};
pub use sync_port::SyncSerialPort;
pub use traits::SerialPortAdapter;
