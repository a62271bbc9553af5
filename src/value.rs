//! Field values as they are snapshotted and compared.

use crate::host::Field;

/// Determines how a field's value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
	/// Anything that carries a plain textual value (text inputs, `<textarea>`, hidden inputs, buttons…).
	Text,
	/// `<input type=checkbox>` and `<input type=radio>`.
	Checkable,
	/// `<select>`, single or multiple.
	Select,
}

/// A snapshot of a field's value.
///
/// Values of different variants never compare equal, so a field that turns disabled is always
/// considered changed, even if its underlying value happens to be the text `"disabled"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
	/// The raw value of a [`FieldKind::Text`] field.
	Text(String),
	/// Whether a [`FieldKind::Checkable`] field is checked.
	Checked(bool),
	/// The values of all currently selected options, in document order.
	Selected(Vec<String>),
	/// Stands in for the value of any disabled field.
	Disabled,
}

/// Reads `field`'s current value according to its [`FieldKind`].
///
/// Returns [`None`] for ignored fields, which are never evaluated.
pub fn read_value<F: Field + ?Sized>(field: &F) -> Option<FieldValue> {
	if field.is_ignored() {
		None
	} else {
		Some(read_tracked_value(field))
	}
}

/// Reads `field`'s current value without consulting its ignore markers.
///
/// Used for fields already known to be tracked, whose ignore status was settled at discovery.
pub fn read_tracked_value<F: Field + ?Sized>(field: &F) -> FieldValue {
	if field.is_disabled() {
		return FieldValue::Disabled;
	}

	match field.kind() {
		FieldKind::Checkable => FieldValue::Checked(field.is_checked()),
		FieldKind::Select => FieldValue::Selected(field.selected_values()),
		FieldKind::Text => FieldValue::Text(field.value()),
	}
}
