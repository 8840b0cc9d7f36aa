//! Runtime half of vigil: everything that talks to a backend.
//!
//! - [`feeds`]: push-capable native event feeds (Docker, systemd)
//! - [`providers`]: HTTP implementation of the provider contract
//! - [`watcher`]: push and poll source watchers and the factory that builds
//!   them from settings
//! - [`supervisor`]: starts and stops all watchers together
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod feeds;
pub mod providers;
pub mod supervisor;
pub mod watcher;

pub use feeds::{DockerFeed, EventFeed, FeedError, FeedStream, SystemdFeed};
pub use providers::HttpServiceProvider;
pub use supervisor::{MonitorSupervisor, SupervisorError};
pub use watcher::{PollWatcher, PushWatcher, SourceWatcher, WatcherContext, build_watchers};
