// Transport module: fabric connection, direct channel contracts, signaling path

pub mod abstraction;
pub mod gate;
pub mod mode;
pub mod signaling;

pub use abstraction::{
    ConfirmationCollector, ConnectionEvent, ConnectionState, DirectDataChannel, FabricConnection,
};
pub use gate::ConnectionGate;
pub use mode::{TransferMode, TransferModeRegistry};
pub use signaling::{
    Envelope, Packet, SignalingSender, ENVELOPE_HEADER_RESERVE, MAX_ENVELOPE_SIZE,
};
