// Tandem Core: reliable delivery for collaborative sessions
//
// Moves transfers between session participants over two channels: a direct
// data channel for bulk payloads and the signaling connection for small
// inline packets and session control. The fabric itself lives behind the
// traits in `transport::abstraction`.

pub mod config;
pub mod delivery;
pub mod error;
pub mod loopback;
pub mod peer;
pub mod session;
pub mod transfer;
pub mod transport;

pub use config::{ConfigError, DeliveryConfig};
pub use delivery::{DeliveryOrchestrator, LeaveReport};
pub use error::{DeliveryError, TransportError};
pub use peer::{PeerId, SessionId};
pub use session::{PeerPresence, SessionObserver, SessionParticipants, SessionSlot};
pub use transfer::{CompressionPolicy, TransferDescriptor, PROTOCOL_VERSION};
pub use transport::{
    ConfirmationCollector, ConnectionEvent, ConnectionGate, ConnectionState, DirectDataChannel,
    Envelope, FabricConnection, Packet, SignalingSender, TransferMode, TransferModeRegistry,
    ENVELOPE_HEADER_RESERVE, MAX_ENVELOPE_SIZE,
};
