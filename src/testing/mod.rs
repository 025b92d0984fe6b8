//! Testing utilities for the kiosk core
//!
//! Fakes for every external collaborator (frame source, video sink, order
//! status client, operator prompt) plus synthetic frame data, enabling
//! offline testing of the full scan-to-persist pipeline without hardware,
//! a codec, or a network.

mod fakes;
mod synthetic;

pub use fakes::{
    FailingSinkFactory, RawSink, RawSinkFactory, ScriptedPrompt, StaticStatusClient,
    SyntheticSource,
};
pub use synthetic::synthetic_frame;
