//! DS1961S over 1-Wire
//!
//! `protocol` holds the wire format, `backend` the bus abstraction and
//! `ds1961` the driver that sequences commands into transactions.

pub mod backend;
pub mod ds1961;
pub mod protocol;

#[cfg(feature = "std")]
pub mod delay;
