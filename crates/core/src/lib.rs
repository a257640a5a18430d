//! Domain crate for the vidforge orchestrator.
//!
//! Zero internal deps so it can be used by the persistence layer, the
//! host client, and the API server alike. Holds the shared type
//! aliases, the job/run status vocabulary and state machine, the
//! schedule translator, the host-service wire types, and the generator
//! subprocess primitive.

pub mod error;
pub mod generator;
pub mod jobspec;
pub mod lifecycle;
pub mod schedule;
pub mod types;
