//! camlink: on-device controller for a camera rig.
//!
//! The controller sits between the rig's microcontroller (line-delimited
//! commands over a USB serial link) and a workstation (captured images over
//! TCP). This crate provides the pieces wired together by the `camlink`
//! binary:
//! - The `protocol` module tokenizes and classifies serial command lines and
//!   renders the acknowledgement replies.
//! - The `presets` module is the append-only preset log.
//! - The `capture` module tracks the capture session (folder + frame index)
//!   and drives the external camera utility behind a capability trait.
//! - The `connection` module performs the workstation IP handshake and
//!   remembers the last good address.
//! - The `upload` module zips a capture folder and streams it over the
//!   established connection.
//! - The `serial` module finds and opens the microcontroller's USB serial
//!   device behind the `SerialLink` seam.
//! - The `startup` module runs the one-time boot sequence.
//! - The `dispatch` module is the top-level read/route/reply loop.
//! - The `error` module defines the error types used across the crate.
//!
//! Design notes:
//! - The whole controller is single-threaded and fully synchronous; the
//!   dispatch loop blocks on one command at a time and handlers block on
//!   external I/O. The half-duplex serial protocol makes queueing
//!   unnecessary.
//! - Session state (capture session, workstation stream) is owned by the
//!   dispatcher and threaded through handlers, never global, so tests can
//!   construct isolated instances against fakes of the `SerialLink` and
//!   `CaptureTool` seams.

pub mod capture;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod presets;
pub mod protocol;
pub mod serial;
pub mod startup;
pub mod upload;
