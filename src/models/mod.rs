pub mod frame;
pub mod status;
pub mod symbol;

pub use frame::RasterFrame;
pub use status::ScanStatus;
pub use symbol::{AcceptedResult, Point, ScanOrigin, SymbolFormat, SymbolResult};
