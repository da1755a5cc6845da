//! Queues image and script assets, loads them, and reports aggregate progress.
//!
//! A [`Preloader`] owns an ordered queue of assets. Each asset is a handle implementing
//! [`LoadAsset`]; locators are turned into handles by their file extension. Starting the
//! queue activates the matching assets, and the host's event loop calls
//! [`Preloader::update`] to route load outcomes and poll stalled assets. Listeners
//! registered with [`Preloader::on`] see every terminal transition along with the
//! completed/total counts of the whole queue.

mod asset_type_registry;
mod assets;
mod clock;
mod handle;
pub mod image;
mod load_request;
mod loader;
mod poller;
mod progress;
pub mod script;
mod settings;

pub use asset_type_registry::*;
pub use assets::*;
pub use clock::*;
pub use handle::*;
pub use load_request::*;
pub use loader::*;
pub use poller::StatusPoller;
pub use progress::*;
pub use settings::*;

pub mod prelude {
    pub use crate::{
        AddOptions, AssetStatus, Handle, LoadAsset, LoaderSettings, Preloader, Progress, Tags,
    };
}
