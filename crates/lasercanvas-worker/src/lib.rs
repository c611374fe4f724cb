#![forbid(unsafe_code)]

//! Offload path for LaserCanvas stability calculations.
//!
//! A [`StabilityWorker`] runs on its own task with its own variable store and
//! talks to the host only through JSON [`WorkerMessage`]s and [`WorkerReply`]s.
//! Element behavior is compiled into both sides through the [`ElementRegistry`];
//! `init` only tells the worker which kinds (and which registry version) the
//! host expects.

mod element;
mod matrix;
mod protocol;
mod worker;

pub use element::{
    BoundElement, Direction, ElementDef, ElementJson, ElementKind, ElementRegistry, ModePlane,
    ANGLE_OF_INCIDENCE, DISTANCE_TO_NEXT, FOCAL_LENGTH, RADIUS_OF_CURVATURE, REGISTRY_VERSION,
};
pub use matrix::Matrix2x2;
pub use protocol::{
    decode, encode, ProtocolError, SystemSnapshot, WorkerMessage, WorkerReply, MAX_MESSAGE_BYTES,
};
pub use worker::{StabilityWorker, StabilityWorkerHandle};
