// Transfer metadata and payload compression

pub mod compress;
pub mod descriptor;

pub use compress::{compress, decompress, CompressionPolicy};
pub use descriptor::{TransferDescriptor, PROTOCOL_VERSION};
