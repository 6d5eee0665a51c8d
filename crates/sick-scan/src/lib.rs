//! sick-scan: SICK scanner driver pieces used by the node
//!
//! - [`profile`]: scanner families and the scan parser
//! - [`dialect`]: CoLa-A / CoLa-B selection
//! - [`cola`]: telegram framing
//! - [`sopas`]: SOPAS command texts
//! - [`session`]: device sessions (TCP and emulated)

pub mod cola;
pub mod dialect;
pub mod profile;
pub mod session;
pub mod sopas;

pub use cola::{ColaError, FrameDecoder};
pub use dialect::{resolve_dialect, select_dialect, Dialect, DialectDecision, MAX_ASCII_LAYERS};
pub use profile::{ProfileError, ScanParser, ScannerProfile, SharedParser, Telegram};
pub use session::{
    AcquisitionStop, CommandSender, DefaultSessionFactory, DeviceSession, EmulatedSession,
    InitOutcome, SessionConfig, SessionError, SessionFactory, SopasRequest, StepOutcome,
    TcpSession,
};
