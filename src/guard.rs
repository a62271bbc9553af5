//! The page-level navigation guard.

use core::fmt::{self, Debug, Formatter};
use tracing::{debug, trace};

/// Window after a prompt during which further prompts are suppressed, in milliseconds.
///
/// Some browsers fire `beforeunload` twice for one navigation.
pub const PROMPT_COOLDOWN_MS: f64 = 900.0;

/// Decides whether leaving the page needs confirmation.
///
/// There is one guard per [`Trackers`](`crate::registry::Trackers`) registry, so normally one per page.
/// Registration happens at most once; later attempts are no-ops.
pub struct UnloadGuard {
	registered: bool,
	prompted_at: Option<f64>,
	on_register: Option<Box<dyn FnOnce()>>,
}
impl Debug for UnloadGuard {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("UnloadGuard")
			.field("registered", &self.registered)
			.field("prompted_at", &self.prompted_at)
			.field("on_register", &self.on_register.as_ref().map(|_| "…"))
			.finish()
	}
}
impl Default for UnloadGuard {
	fn default() -> Self {
		Self::new()
	}
}
impl UnloadGuard {
	#[must_use]
	pub fn new() -> Self {
		Self {
			registered: false,
			prompted_at: None,
			on_register: None,
		}
	}

	/// Creates a guard that runs `on_register` when it is first registered,
	/// for example to install the host's unload interceptor.
	#[must_use]
	pub fn with_registration_hook(on_register: impl 'static + FnOnce()) -> Self {
		Self {
			on_register: Some(Box::new(on_register)),
			..Self::new()
		}
	}

	#[must_use]
	pub fn is_registered(&self) -> bool {
		self.registered
	}

	/// Registers the guard. Returns whether this call did so.
	pub fn register_once(&mut self) -> bool {
		if self.registered {
			trace!("Unload guard already registered.");
			return false;
		}

		self.registered = true;
		if let Some(on_register) = self.on_register.take() {
			on_register()
		}
		debug!("Registered unload guard.");
		true
	}

	/// A clock that went backwards since the last prompt doesn't count as recent.
	#[must_use]
	pub fn has_prompted_recently(&self, now_ms: f64) -> bool {
		self.prompted_at
			.map_or(false, |prompted_at| (0.0..PROMPT_COOLDOWN_MS).contains(&(now_ms - prompted_at)))
	}

	/// Answers an unload attempt at `now_ms`.
	///
	/// `message` is the confirmation message of the dirty form that should be reported, if any.
	/// Returns the text to prompt with, or [`None`] if navigation may proceed unannounced.
	pub fn confirm(&mut self, message: Option<&str>, now_ms: f64) -> Option<String> {
		if !self.registered {
			return None;
		}

		let message = message?;
		if self.has_prompted_recently(now_ms) {
			trace!("Suppressed repeated unload prompt.");
			return None;
		}

		self.prompted_at = Some(now_ms);
		Some(message.to_owned())
	}
}
