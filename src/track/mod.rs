//! Track store: recorded per-tick object states joined with static properties.

pub mod store;
pub mod types;

pub use store::{StoreError, TrackStore};
pub use types::{LightState, ObjectCategory, ObjectId, ObjectProperty, Status, Tick, TrackPoint};
