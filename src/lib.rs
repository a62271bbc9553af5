#![doc(html_root_url = "https://docs.rs/dirty-form-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Tracks whether HTML forms were modified since they were loaded, and asks before the page is left while one is.
//!
//! The state machine in [`tracker`] and the registry in [`registry`] only depend on the [`host`] traits.
//! [`dom`] implements those on top of [`web_sys`].

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod dom;
pub mod guard;
pub mod host;
mod listeners;
pub mod registry;
pub mod settings;
pub mod tracker;
pub mod value;

pub use registry::{NotInitializedError, Trackers};
