//! autolimit library.
//!
//! A limiter node for audio pipelines: the limiter's parameters are bound to
//! a persisted configuration store, its meters are sampled on a fixed cadence
//! and broadcast, and its input gain follows a target loudness.
//!
//! Everything runs on a single host event loop (a tokio current-thread
//! runtime driving a `LocalSet`), so node state is shared with `Rc`.

pub mod autovolume;
pub mod binding;
pub mod config;
pub mod element;
pub mod events;
pub mod host;
pub mod logging;
pub mod metering;
pub mod node;
pub mod paths;
pub mod settings;
pub mod transform;

pub use events::EventBroadcaster;
pub use node::{LimiterNode, NodeError, NodeOptions};
pub use settings::Settings;
