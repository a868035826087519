//! # FoamSender Core
//!
//! Core types shared by the FoamSender crates: the error taxonomy, the
//! four-axis machine model, status messages, events and cancellation.

pub mod cancel;
pub mod error;
pub mod event;
pub mod machine;
pub mod status;

pub use cancel::CancellationToken;
pub use error::{ConnectionError, Error, Result, ShellError, TransmissionError};
pub use event::{EventDispatcher, EventReceiver, RecvError, SenderEvent, TryRecvError};
pub use machine::{
    jog_commands, validate_step, Axis, JogDirection, ABSOLUTE_MODE, RAPID_MOVE, RELATIVE_MODE,
};
pub use status::{MessageLevel, StatusMessage};
