//! The observation layer a [`Trackers`](`crate::registry::Trackers`) registry runs on.
//!
//! [`dom`](`crate::dom`) implements these traits on top of [`web_sys`], but anything that can enumerate fields
//! and read their values can host dirty-state tracking.

use crate::value::FieldKind;
use core::{fmt::Debug, hash::Hash};

/// Field-level events that cause the owning form to be re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationEvent {
	Change,
	KeyUp,
	/// Legacy Internet Explorer `propertychange`.
	PropertyChange,
	Input,
}
impl MutationEvent {
	/// The default mutation event set.
	pub const ALL: [MutationEvent; 4] = [Self::Change, Self::KeyUp, Self::PropertyChange, Self::Input];

	/// The DOM event type.
	#[must_use]
	pub fn event_type(self) -> &'static str {
		match self {
			Self::Change => "change",
			Self::KeyUp => "keyup",
			Self::PropertyChange => "propertychange",
			Self::Input => "input",
		}
	}
}

/// Notifications raised on a form when its dirty state flips.
///
/// [`StateEvent::Dirty`] or [`StateEvent::Clean`] is always followed by [`StateEvent::Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateEvent {
	Dirty,
	Clean,
	Change,
}
impl StateEvent {
	/// The DOM event type dispatched on the form.
	#[must_use]
	pub fn event_type(self) -> &'static str {
		match self {
			Self::Dirty => "dirty.areYouSure",
			Self::Clean => "clean.areYouSure",
			Self::Change => "change.areYouSure",
		}
	}
}

/// One observable input element.
///
/// All methods take `&self`: implementations are expected to be cheap handles to host objects.
pub trait Field {
	/// Identity of the underlying element. Two handles to the same element must return equal keys.
	type Key: Clone + Eq + Hash + Debug;

	fn key(&self) -> Self::Key;

	/// Whether the field carries an explicit ignore marker or has no name.
	///
	/// Only consulted once, when the field is discovered.
	fn is_ignored(&self) -> bool;
	fn is_disabled(&self) -> bool;
	fn kind(&self) -> FieldKind;

	/// The raw value of a [`FieldKind::Text`] field.
	fn value(&self) -> String;
	/// The checked state of a [`FieldKind::Checkable`] field.
	fn is_checked(&self) -> bool;
	/// The values of the selected options of a [`FieldKind::Select`] field, in document order.
	fn selected_values(&self) -> Vec<String>;

	/// Toggles the field's own visible "changed" marker.
	fn set_changed_marker(&self, class: &str, changed: bool);

	/// Starts routing `events` on this field to the tracker of its form.
	///
	/// Binding the same event more than once must not result in duplicate deliveries.
	fn bind(&self, events: &[MutationEvent]);
	fn unbind(&self, events: &[MutationEvent]);
}

/// A form-like container of [`Field`]s.
pub trait Form: 'static + Clone {
	type Key: Clone + Eq + Hash + Debug;
	type Field: Field;

	fn key(&self) -> Self::Key;

	/// All fields currently matching `selector`, in document order.
	fn fields(&self, selector: &str) -> Vec<Self::Field>;

	/// Mirrors the form's dirty state onto its visible marker.
	fn set_dirty_marker(&self, class: &str, dirty: bool);

	/// Raises `event` on the form for outside listeners.
	fn dispatch(&self, event: StateEvent);

	/// Whether the form is still part of its document.
	///
	/// Disconnected forms are dropped from their registry the next time the page is about to be left.
	fn is_connected(&self) -> bool {
		true
	}

	/// Enables or disables the form's submit controls.
	///
	/// Only used by [`Settings`](`crate::settings::Settings`) that gate submission on dirtiness.
	fn set_submit_enabled(&self, _enabled: bool) {}
}
