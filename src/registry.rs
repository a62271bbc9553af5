//! Per-page bookkeeping of tracked forms.

use crate::{
	guard::UnloadGuard,
	host::{Field, Form},
	tracker::{Config, StateChangeHandler, TrackedForm, Transition},
};
use hashbrown::{hash_map::Entry, HashMap};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, instrument};

/// A per-form operation was called on a form that was never initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no dirty tracker is attached to this form")]
pub struct NotInitializedError;

/// All tracked forms of one page, plus the page's [`UnloadGuard`].
///
/// Operations that can flip a form's state return the pending [`Transition`].
/// Call [`Transition::emit`] once any borrow of the registry has been released.
pub struct Trackers<F: Form> {
	forms: HashMap<F::Key, TrackedForm<F>>,
	guard: UnloadGuard,
	next_sequence: u64,
}
impl<F: Form> Default for Trackers<F> {
	fn default() -> Self {
		Self::new()
	}
}
impl<F: Form> Trackers<F> {
	#[must_use]
	pub fn new() -> Self {
		Self::with_guard(UnloadGuard::new())
	}

	#[must_use]
	pub fn with_guard(guard: UnloadGuard) -> Self {
		Self {
			forms: HashMap::new(),
			guard,
			next_sequence: 0,
		}
	}

	#[must_use]
	pub fn guard(&self) -> &UnloadGuard {
		&self.guard
	}

	#[must_use]
	pub fn is_tracked(&self, form: &F) -> bool {
		self.forms.contains_key(&form.key())
	}

	#[must_use]
	pub fn get(&self, form: &F) -> Option<&TrackedForm<F>> {
		self.forms.get(&form.key())
	}

	fn tracked_mut(&mut self, form: &F) -> Result<&mut TrackedForm<F>, NotInitializedError> {
		self.forms.get_mut(&form.key()).ok_or(NotInitializedError)
	}

	/// Starts tracking `form`, snapshotting all matching fields as baselines.
	///
	/// Initializing an already tracked form replaces its configuration and bindings and starts over from fresh baselines.
	/// State change handlers are kept.
	#[instrument(skip(self, form, config), fields(form = ?form.key()))]
	pub fn initialize(&mut self, form: F, config: Config<F>) -> Option<Transition<F>> {
		if !config.silent {
			self.guard.register_once();
		}

		let next_sequence = &mut self.next_sequence;
		let tracked = match self.forms.entry(form.key()) {
			Entry::Occupied(occupied) => {
				debug!("Re-initializing tracked form.");
				let tracked = occupied.into_mut();
				tracked.replace_config(config);
				tracked
			}
			Entry::Vacant(vacant) => {
				let sequence = *next_sequence;
				*next_sequence += 1;
				vacant.insert(TrackedForm::new(form, config, sequence))
			}
		};
		tracked.initialize()
	}

	/// # Errors
	///
	/// Iff `form` isn't tracked.
	pub fn is_dirty(&self, form: &F) -> Result<bool, NotInitializedError> {
		self.forms.get(&form.key()).map(TrackedForm::is_dirty).ok_or(NotInitializedError)
	}

	/// Registers `handler` to be called with the form after each dirty/clean transition.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	pub fn on_state_change(&mut self, form: &F, handler: impl 'static + Fn(&F)) -> Result<(), NotInitializedError> {
		let handler: StateChangeHandler<F> = Rc::new(handler);
		self.tracked_mut(form)?.add_handler(handler);
		Ok(())
	}

	/// Re-checks `form` after a mutation event on `field`.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form, field), fields(form = ?form.key(), field = ?field.key()))]
	pub fn check_field(&mut self, form: &F, field: &F::Field) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.check(Some(field)))
	}

	/// Re-checks every field of `form`.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn check_form(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.check(None))
	}

	/// Starts tracking fields that were added since initialization without touching existing baselines, then re-checks the form.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn rescan(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.rescan())
	}

	/// Drops all baselines of `form` and initializes it again with its current configuration.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn reinitialize(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.initialize())
	}

	/// Marks `form` clean without looking at its fields. Baselines and bindings stay as they are.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn mark_clean(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.set_dirty_status(false))
	}

	/// Handles a form `reset` event.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn reset(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		Ok(self.tracked_mut(form)?.set_dirty_status(false))
	}

	/// Handles a form `submit` event: marks the form clean if its configuration asks for that.
	///
	/// # Errors
	///
	/// Iff `form` isn't tracked.
	#[instrument(skip(self, form), fields(form = ?form.key()))]
	pub fn submitted(&mut self, form: &F) -> Result<Option<Transition<F>>, NotInitializedError> {
		let tracked = self.tracked_mut(form)?;
		Ok(if tracked.config().remove_dirty_marker_on_submit {
			tracked.set_dirty_status(false)
		} else {
			None
		})
	}

	/// All currently dirty forms that are still connected, in initialization order.
	pub fn query_dirty_forms(&self) -> impl Iterator<Item = &F> {
		let mut dirty: Vec<_> = self
			.forms
			.values()
			.filter(|tracked| tracked.is_dirty() && tracked.form().is_connected())
			.collect();
		dirty.sort_by_key(|tracked| tracked.sequence());
		dirty.into_iter().map(TrackedForm::form)
	}

	/// Stops tracking every form that isn't connected anymore and unbinds its fields.
	///
	/// Returns the keys of the dropped forms.
	#[instrument(skip(self))]
	pub fn prune_disconnected(&mut self) -> Vec<F::Key> {
		let disconnected: Vec<_> = self
			.forms
			.iter()
			.filter(|(_, tracked)| !tracked.form().is_connected())
			.map(|(key, _)| key.clone())
			.collect();
		for key in &disconnected {
			if let Some(tracked) = self.forms.remove(key) {
				debug!(form = ?key, "Dropped disconnected form.");
				tracked.unbind_all()
			}
		}
		disconnected
	}

	/// Answers a page unload attempt at `now_ms` (host clock, in milliseconds).
	///
	/// Disconnected forms are pruned first. Returns the confirmation message of the first dirty form that isn't silent,
	/// unless the guard was never registered or has prompted within the last [`PROMPT_COOLDOWN_MS`](`crate::guard::PROMPT_COOLDOWN_MS`).
	#[instrument(skip(self))]
	pub fn before_unload(&mut self, now_ms: f64) -> Option<String> {
		self.prune_disconnected();
		let message = self
			.forms
			.values()
			.filter(|tracked| tracked.is_dirty() && !tracked.config().silent)
			.min_by_key(|tracked| tracked.sequence())
			.map(|tracked| tracked.config().confirmation_message.as_str());
		self.guard.confirm(message, now_ms)
	}
}
