//! The per-form dirty state machine.

use crate::{
	host::{Field, Form, MutationEvent, StateEvent},
	value::{read_tracked_value, FieldValue},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, trace, trace_span};

/// Called with the form and its new dirty state whenever that state flips.
pub type ChangeCallback<F> = Rc<dyn Fn(&F, bool)>;

/// Called with the form after every dirty/clean transition.
pub type StateChangeHandler<F> = Rc<dyn Fn(&F)>;

pub const DEFAULT_FIELD_SELECTOR: &str = "input:not([type=submit]):not([type=button]), select, textarea, button";
pub const DEFAULT_CONFIRMATION_MESSAGE: &str = "You have unsaved changes!";
pub const DEFAULT_DIRTY_CLASS: &str = "dirty";

/// Options for one tracked form.
pub struct Config<F> {
	pub change_notification: Option<ChangeCallback<F>>,
	/// Don't take part in the navigation guard.
	pub silent: bool,
	pub remove_dirty_marker_on_submit: bool,
	/// Treat a changed number of matching fields as dirty.
	pub count_structural_changes: bool,
	pub mutation_events: Vec<MutationEvent>,
	pub field_selector: String,
	pub confirmation_message: String,
	/// Marker class toggled on the form and on each changed field.
	pub dirty_class: String,
}
impl<F> Default for Config<F> {
	fn default() -> Self {
		Self {
			change_notification: None,
			silent: false,
			remove_dirty_marker_on_submit: true,
			count_structural_changes: true,
			mutation_events: MutationEvent::ALL.to_vec(),
			field_selector: DEFAULT_FIELD_SELECTOR.to_owned(),
			confirmation_message: DEFAULT_CONFIRMATION_MESSAGE.to_owned(),
			dirty_class: DEFAULT_DIRTY_CLASS.to_owned(),
		}
	}
}
impl<F> Clone for Config<F> {
	fn clone(&self) -> Self {
		Self {
			change_notification: self.change_notification.clone(),
			silent: self.silent,
			remove_dirty_marker_on_submit: self.remove_dirty_marker_on_submit,
			count_structural_changes: self.count_structural_changes,
			mutation_events: self.mutation_events.clone(),
			field_selector: self.field_selector.clone(),
			confirmation_message: self.confirmation_message.clone(),
			dirty_class: self.dirty_class.clone(),
		}
	}
}
impl<F> Debug for Config<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("change_notification", &self.change_notification.as_ref().map(|_| "…"))
			.field("silent", &self.silent)
			.field("remove_dirty_marker_on_submit", &self.remove_dirty_marker_on_submit)
			.field("count_structural_changes", &self.count_structural_changes)
			.field("mutation_events", &self.mutation_events)
			.field("field_selector", &self.field_selector)
			.field("confirmation_message", &self.confirmation_message)
			.field("dirty_class", &self.dirty_class)
			.finish()
	}
}

/// A field as first seen by its tracker.
#[derive(Debug)]
pub struct TrackedField<E> {
	field: E,
	baseline: Option<FieldValue>,
	ignored: bool,
}
impl<E: Field> TrackedField<E> {
	fn discover(field: E) -> Self {
		let ignored = field.is_ignored();
		let baseline = if ignored { None } else { Some(read_tracked_value(&field)) };
		Self { field, baseline, ignored }
	}

	#[must_use]
	pub fn field(&self) -> &E {
		&self.field
	}

	/// [`None`] exactly if the field is ignored.
	#[must_use]
	pub fn baseline(&self) -> Option<&FieldValue> {
		self.baseline.as_ref()
	}

	#[must_use]
	pub fn is_ignored(&self) -> bool {
		self.ignored
	}

	/// Compares `live` (a handle to the same element) against the baseline and updates its changed marker.
	fn check(&self, live: &E, dirty_class: &str) -> bool {
		let changed = match (&self.baseline, self.ignored) {
			(Some(baseline), false) => read_tracked_value(live) != *baseline,
			_ => false,
		};
		live.set_changed_marker(dirty_class, changed);

		if cfg!(feature = "dangerous-logging") {
			trace!(key = ?live.key(), changed, baseline = ?self.baseline, current = ?(!self.ignored).then(|| read_tracked_value(live)), "Checked field.");
		} else {
			trace!(key = ?live.key(), changed, "Checked field.");
		}
		changed
	}
}

/// Everything a registry knows about one form.
pub struct TrackedForm<F: Form> {
	form: F,
	config: Config<F>,
	fields: HashMap<<F::Field as Field>::Key, TrackedField<F::Field>>,
	original_field_count: usize,
	is_dirty: bool,
	handlers: Vec<StateChangeHandler<F>>,
	sequence: u64,
}
impl<F: Form> Debug for TrackedForm<F>
where
	F::Field: Debug,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackedForm")
			.field("form", &self.form.key())
			.field("config", &self.config)
			.field("fields", &self.fields)
			.field("original_field_count", &self.original_field_count)
			.field("is_dirty", &self.is_dirty)
			.field("handlers", &self.handlers.len())
			.field("sequence", &self.sequence)
			.finish()
	}
}
impl<F: Form> TrackedForm<F> {
	pub(crate) fn new(form: F, config: Config<F>, sequence: u64) -> Self {
		Self {
			form,
			config,
			fields: HashMap::new(),
			original_field_count: 0,
			is_dirty: false,
			handlers: Vec::new(),
			sequence,
		}
	}

	#[must_use]
	pub fn form(&self) -> &F {
		&self.form
	}

	#[must_use]
	pub fn config(&self) -> &Config<F> {
		&self.config
	}

	#[must_use]
	pub fn is_dirty(&self) -> bool {
		self.is_dirty
	}

	#[must_use]
	pub fn original_field_count(&self) -> usize {
		self.original_field_count
	}

	#[must_use]
	pub fn field(&self, key: &<F::Field as Field>::Key) -> Option<&TrackedField<F::Field>> {
		self.fields.get(key)
	}

	/// Number of fields that have a [`TrackedField`] entry, ignored ones included.
	#[must_use]
	pub fn tracked_field_count(&self) -> usize {
		self.fields.len()
	}

	/// Initialization order within the owning registry.
	pub(crate) fn sequence(&self) -> u64 {
		self.sequence
	}

	pub(crate) fn add_handler(&mut self, handler: StateChangeHandler<F>) {
		self.handlers.push(handler)
	}

	/// Replaces the configuration, unbinding every tracked field from the previous event set.
	pub(crate) fn replace_config(&mut self, config: Config<F>) {
		self.unbind_all();
		self.config = config;
	}

	pub(crate) fn unbind_all(&self) {
		for tracked in self.fields.values() {
			tracked.field.unbind(&self.config.mutation_events)
		}
	}

	/// Drops all baselines and snapshots the form from scratch. The result is always clean.
	pub(crate) fn initialize(&mut self) -> Option<Transition<F>> {
		self.unbind_all();
		self.fields.clear();

		let fields = self.form.fields(&self.config.field_selector);
		self.original_field_count = fields.len();
		for field in fields {
			field.bind(&self.config.mutation_events);
			self.fields.insert(field.key(), TrackedField::discover(field));
		}
		debug!(form = ?self.form.key(), fields = self.original_field_count, "Snapshotted baselines.");

		self.set_dirty_status(false)
	}

	/// Starts tracking fields that appeared since the last snapshot, then re-checks the form.
	pub(crate) fn rescan(&mut self) -> Option<Transition<F>> {
		let mut added = 0_usize;
		for field in self.form.fields(&self.config.field_selector) {
			let key = field.key();
			if !self.fields.contains_key(&key) {
				field.bind(&self.config.mutation_events);
				self.fields.insert(key, TrackedField::discover(field));
				added += 1;
			}
		}
		debug!(form = ?self.form.key(), added, "Rescanned.");

		self.check(None)
	}

	/// Recomputes the dirty state from the current field values.
	///
	/// `target` is checked first. The full scan always runs afterwards, since it also refreshes every field's changed marker.
	pub(crate) fn check(&mut self, target: Option<&F::Field>) -> Option<Transition<F>> {
		let target_dirty = target.map_or(false, |target| self.is_field_dirty(target));

		let fields = self.form.fields(&self.config.field_selector);
		let mut any_dirty = false;
		for field in &fields {
			if self.is_field_dirty(field) {
				any_dirty = true;
			}
		}

		let structural = self.config.count_structural_changes && fields.len() != self.original_field_count;
		if structural {
			trace!(form = ?self.form.key(), original = self.original_field_count, current = fields.len(), "Field count changed.");
		}

		self.set_dirty_status(target_dirty || any_dirty || structural)
	}

	/// A field without a [`TrackedField`] entry is never dirty and its marker is left alone.
	fn is_field_dirty(&self, field: &F::Field) -> bool {
		match self.fields.get(&field.key()) {
			Some(tracked) => tracked.check(field, &self.config.dirty_class),
			None => false,
		}
	}

	/// Writes the state and marker, then reports a [`Transition`] if the state flipped.
	pub(crate) fn set_dirty_status(&mut self, dirty: bool) -> Option<Transition<F>> {
		let changed = dirty != self.is_dirty;
		self.is_dirty = dirty;
		self.form.set_dirty_marker(&self.config.dirty_class, dirty);

		if !changed {
			return None;
		}

		debug!(form = ?self.form.key(), dirty, "Dirty state changed.");
		Some(Transition {
			form: self.form.clone(),
			dirty,
			callback: self.config.change_notification.clone(),
			handlers: self.handlers.clone(),
		})
	}
}

/// A dirty/clean flip whose notifications are still pending.
///
/// The state has already been written when this is handed out, so listeners that re-enter the
/// registry observe the settled state.
#[must_use = "Notifications are only raised by `Transition::emit`."]
pub struct Transition<F> {
	form: F,
	dirty: bool,
	callback: Option<ChangeCallback<F>>,
	handlers: Vec<StateChangeHandler<F>>,
}
impl<F: Form> Debug for Transition<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transition")
			.field("form", &self.form.key())
			.field("dirty", &self.dirty)
			.field("callback", &self.callback.is_some())
			.field("handlers", &self.handlers.len())
			.finish()
	}
}
impl<F: Form> Transition<F> {
	#[must_use]
	pub fn form(&self) -> &F {
		&self.form
	}

	/// The new state.
	#[must_use]
	pub fn dirty(&self) -> bool {
		self.dirty
	}

	/// Runs the change callback, raises [`StateEvent::Dirty`] or [`StateEvent::Clean`] and then [`StateEvent::Change`],
	/// then calls each state change handler.
	pub fn emit(self) {
		let span = trace_span!("Emitting transition", form = ?self.form.key(), dirty = self.dirty);
		let _enter = span.enter();

		if let Some(callback) = &self.callback {
			callback(&self.form, self.dirty)
		}
		self.form.dispatch(if self.dirty { StateEvent::Dirty } else { StateEvent::Clean });
		self.form.dispatch(StateEvent::Change);
		for handler in &self.handlers {
			handler(&self.form)
		}
	}
}
