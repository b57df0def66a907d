//! colorsense - click-to-recolor engine for room photos
//!
//! A user uploads a photo, clicks a point, and gets the image back with the
//! clicked region painted. Regions come from a learned point-prompt
//! segmentation model when one is available, and from a colour flood fill
//! otherwise; either way the session, history and compositing work the same.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod render;
pub mod select;
pub mod service;
pub mod session;
pub mod types;

pub use api::{dispatch, dispatch_local, dispatch_local_str, dispatch_str, ApiReply};
pub use config::{
    BlendConfig, BlendMode, Config, FillConfig, FillRange, ModelConfig, SessionConfig,
};
pub use error::{ColorizeError, ErrorKind, Result};
pub use render::{apply, Tint};
pub use select::{
    flood_fill, probe, FloodFillSelector, LearnedSelector, ModelLoader, PromptModel,
    RegionSelector, SelectorKind,
};
pub use service::{ColorizerService, ImageReply, Persisted, SessionCreated};
pub use session::{EditHistory, Session, SessionId, SessionStore};
pub use types::{Colour, Mask, Point};
