pub mod clock;
pub mod codec;
pub mod domain;
pub mod edit_window;
pub mod external;
pub mod memory;
pub mod persistence;
pub mod ports;
pub mod recovery;
pub mod scheduler;
pub mod sessions;
pub mod side_channel;
pub mod time_logs;
pub mod tracker;

pub use clock::{FixedClock, SystemClock};
pub use edit_window::EditWindowPolicy;
pub use external::{BackupStatus, ExternalSnapshotStore};
pub use persistence::PersistenceLayer;
pub use ports::{Clock, KeyValueStore, PortError, PortResult};
pub use recovery::{Provenance, RecoveryOutcome};
pub use side_channel::SideChannel;
pub use tracker::StudyTracker;
