//! Mission dispatch and execution plumbing shared by the commander and the
//! soldier: transport, reliable publishing, the mission ledger, credential
//! rotation and the two consumption loops.

pub mod config;
pub mod dispatch;
pub mod executor;
pub mod ledger;
pub mod mission;
pub mod publisher;
pub mod rotation;
pub mod transport;
pub mod util;

pub use config::{load_config, Config, TransportBackend, TransportConfig};
pub use dispatch::{run_status_consumer, DispatchError, Dispatcher};
pub use executor::{Executor, MissionBody, SimulatedBody};
pub use ledger::{ApplyOutcome, LedgerError, MissionLedger};
pub use mission::{Mission, MissionStatus, StatusUpdate};
pub use publisher::{PublishError, ReliablePublisher, RetryPolicy};
pub use rotation::{AuthState, CredentialStore, RotationError, RotationPolicy, TokenLifecycleManager};
pub use transport::{Delivery, LeaseToken, LocalTransport, Transport};
