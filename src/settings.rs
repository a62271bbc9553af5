//! Presets for the most common way of tracking a form.
//!
//! Settings are layered: defaults, then whatever was stored for the form earlier, then `data-*` attributes, then explicit overrides.

use crate::{
	host::Form,
	registry::Trackers,
	tracker::{ChangeCallback, Config, Transition},
};
use std::rc::Rc;
use tracing::{instrument, warn};

/// Class that opts a form into [`auto_bind`](`crate::dom::auto_bind`).
pub const AUTO_BIND_CLASS: &str = "arsis-dirty-form";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// Keep submit controls disabled while the form is clean.
	pub submit_enable_only_when_form_dirty: bool,
	pub confirm_to_leave_page_when_dirty: bool,
	pub confirm_msg: String,
	/// Treat added or removed fields as a modification.
	///
	/// Careful with widgets that add or remove inputs behind the scenes.
	pub add_remove_fields_marks_dirty: bool,
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			submit_enable_only_when_form_dirty: true,
			confirm_to_leave_page_when_dirty: true,
			confirm_msg: "Hay cambios sin guardar.".to_owned(),
			add_remove_fields_marks_dirty: false,
		}
	}
}

/// Explicit overrides. [`None`] leaves the underlying layer's value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
	pub submit_enable_only_when_form_dirty: Option<bool>,
	pub confirm_to_leave_page_when_dirty: Option<bool>,
	pub confirm_msg: Option<String>,
	pub add_remove_fields_marks_dirty: Option<bool>,
}

/// Lower-cased names of the `data-*` attributes (without prefix) that map to [`Settings`] fields.
pub const DATA_ATTRIBUTES: [&str; 4] = [
	"submitenableonlywhenformdirty",
	"confirmtoleavepagewhendirty",
	"confirmmsg",
	"addremovefieldsmarksdirty",
];

impl Settings {
	/// Applies `patch` on top of `self`.
	#[must_use]
	pub fn patched(mut self, patch: &SettingsPatch) -> Self {
		if let Some(value) = patch.submit_enable_only_when_form_dirty {
			self.submit_enable_only_when_form_dirty = value
		}
		if let Some(value) = patch.confirm_to_leave_page_when_dirty {
			self.confirm_to_leave_page_when_dirty = value
		}
		if let Some(value) = &patch.confirm_msg {
			self.confirm_msg = value.clone()
		}
		if let Some(value) = patch.add_remove_fields_marks_dirty {
			self.add_remove_fields_marks_dirty = value
		}
		self
	}

	/// Builds the `data-*` layer.
	///
	/// `data` looks up an attribute by its lower-cased name without the `data-` prefix.
	/// Boolean attributes must read `true` or `false`; other values are logged and ignored.
	pub fn data_attribute_patch(data: impl Fn(&str) -> Option<String>) -> SettingsPatch {
		let flag = |name: &str| {
			let value = data(name)?;
			match value.trim() {
				"true" => Some(true),
				"false" => Some(false),
				_ => {
					warn!("Ignoring `data-{}`: Expected `true` or `false` but found {:?}.", name, value);
					None
				}
			}
		};

		SettingsPatch {
			submit_enable_only_when_form_dirty: flag(DATA_ATTRIBUTES[0]),
			confirm_to_leave_page_when_dirty: flag(DATA_ATTRIBUTES[1]),
			confirm_msg: data(DATA_ATTRIBUTES[2]),
			add_remove_fields_marks_dirty: flag(DATA_ATTRIBUTES[3]),
		}
	}

	/// Layers stored settings (or the defaults), the `data-*` attributes and `explicit`.
	#[must_use]
	pub fn layered(stored: Option<Settings>, data: impl Fn(&str) -> Option<String>, explicit: &SettingsPatch) -> Self {
		stored
			.unwrap_or_default()
			.patched(&Self::data_attribute_patch(data))
			.patched(explicit)
	}

	/// The tracker configuration these settings stand for.
	#[must_use]
	pub fn to_config<F: Form>(&self) -> Config<F> {
		let mut config = Config {
			count_structural_changes: self.add_remove_fields_marks_dirty,
			..Config::default()
		};

		if self.confirm_to_leave_page_when_dirty {
			config.confirmation_message = self.confirm_msg.clone();
		} else {
			config.silent = true;
		}

		if self.submit_enable_only_when_form_dirty {
			let callback: ChangeCallback<F> = Rc::new(|form: &F, dirty: bool| form.set_submit_enabled(dirty));
			config.change_notification = Some(callback);
		}

		config
	}

	/// Starts tracking `form` with these settings and checks it once.
	///
	/// Returns the resulting transitions in order. Emit them after releasing `trackers`.
	#[must_use = "Notifications are only raised by `Transition::emit`."]
	#[instrument(skip(trackers, form), fields(form = ?form.key()))]
	pub fn apply<F: Form>(&self, trackers: &mut Trackers<F>, form: &F) -> Vec<Transition<F>> {
		if self.submit_enable_only_when_form_dirty {
			form.set_submit_enabled(false)
		}

		let initialized = trackers.initialize(form.clone(), self.to_config());
		let checked = trackers.check_form(form).ok().flatten();
		initialized.into_iter().chain(checked).collect()
	}
}
