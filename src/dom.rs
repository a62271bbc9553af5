//! [`web_sys`] bindings and the page-wide registry.
//!
//! All tracked forms of the page live in one thread-local [`Trackers`] registry.
//! Its [`UnloadGuard`] installs a `beforeunload` listener on `window` the first time a non-silent form is attached.
//!
//! Mutation events on fields, as well as `submit`, `reset`, `rescan.areYouSure`, `reinitialize.areYouSure` and `checkform.areYouSure`
//! on forms, are routed to the registry automatically once a form is attached.

use crate::{
	guard::UnloadGuard,
	host::{Field, Form, MutationEvent, StateEvent},
	listeners,
	registry::{NotInitializedError, Trackers},
	settings::{Settings, SettingsPatch, AUTO_BIND_CLASS},
	tracker::{Config, Transition},
	value::FieldKind,
};
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use js_sys::{Object, Reflect, WeakMap};
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue, UnwrapThrowExt};
use web_sys::{
	BeforeUnloadEvent, CustomEvent, CustomEventInit, Element, Event, HtmlButtonElement, HtmlFormElement, HtmlInputElement, HtmlOptionElement, HtmlSelectElement,
	HtmlTextAreaElement, NodeList,
};

/// Classes that exclude a field from tracking.
pub const IGNORE_CLASSES: [&str; 2] = ["ays-ignore", "aysIgnore"];
/// Attribute that excludes a field from tracking if it is present and non-empty.
pub const IGNORE_ATTRIBUTE: &str = "data-ays-ignore";

struct ElementKeys {
	keys: WeakMap,
	next: Cell<u32>,
}

thread_local! {
	static TRACKERS: RefCell<Trackers<DomForm>> = RefCell::new(Trackers::with_guard(UnloadGuard::with_registration_hook(listeners::bind_before_unload)));
	static SETTINGS: RefCell<HashMap<u32, Settings>> = RefCell::new(HashMap::new());
	static ELEMENT_KEYS: ElementKeys = ElementKeys { keys: WeakMap::new(), next: Cell::new(0) };
}

/// A page-unique identity for `element` that doesn't keep it alive.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn element_key(element: &Element) -> u32 {
	ELEMENT_KEYS.with(|element_keys| {
		let object: &Object = element.unchecked_ref();
		if let Some(key) = element_keys.keys.get(object).as_f64() {
			return key as u32;
		}

		let key = element_keys.next.get();
		element_keys.next.set(key.checked_add(1).expect_throw("dirty-form-dom: Ran out of element keys."));
		element_keys.keys.set(object, &JsValue::from(key));
		key
	})
}

fn elements(node_list: &NodeList) -> impl '_ + Iterator<Item = Element> {
	(0..node_list.length()).filter_map(move |i| node_list.get(i)?.dyn_into::<Element>().ok())
}

fn toggle_class(element: &Element, class: &str, force: bool) {
	if let Err(error) = element.class_list().toggle_with_force(class, force) {
		error!("Failed to toggle class {:?}: {:?}", class, error)
	}
}

/// An input-like element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomField(pub Element);

impl Field for DomField {
	type Key = u32;

	fn key(&self) -> u32 {
		element_key(&self.0)
	}

	fn is_ignored(&self) -> bool {
		let class_list = self.0.class_list();
		IGNORE_CLASSES.iter().any(|class| class_list.contains(class))
			|| self.0.get_attribute(IGNORE_ATTRIBUTE).map_or(false, |value| !value.is_empty())
			|| !self.0.has_attribute("name")
	}

	fn is_disabled(&self) -> bool {
		self.0.matches(":disabled").unwrap_or_else(|error| {
			error!("Failed to match `:disabled`: {:?}", error);
			false
		})
	}

	fn kind(&self) -> FieldKind {
		if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
			match input.type_().as_str() {
				"checkbox" | "radio" => FieldKind::Checkable,
				_ => FieldKind::Text,
			}
		} else if self.0.dyn_ref::<HtmlSelectElement>().is_some() {
			FieldKind::Select
		} else {
			FieldKind::Text
		}
	}

	fn value(&self) -> String {
		if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
			input.value()
		} else if let Some(text_area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
			text_area.value()
		} else if let Some(button) = self.0.dyn_ref::<HtmlButtonElement>() {
			button.value()
		} else {
			Reflect::get(&self.0, &JsValue::from_str("value")).ok().and_then(|value| value.as_string()).unwrap_or_default()
		}
	}

	fn is_checked(&self) -> bool {
		self.0.dyn_ref::<HtmlInputElement>().map_or(false, HtmlInputElement::checked)
	}

	fn selected_values(&self) -> Vec<String> {
		let select = match self.0.dyn_ref::<HtmlSelectElement>() {
			Some(select) => select,
			None => return Vec::new(),
		};
		let selected = select.selected_options();
		(0..selected.length())
			.filter_map(|i| selected.item(i)?.dyn_into::<HtmlOptionElement>().ok())
			.map(|option| option.value())
			.collect()
	}

	fn set_changed_marker(&self, class: &str, changed: bool) {
		toggle_class(&self.0, class, changed)
	}

	fn bind(&self, events: &[MutationEvent]) {
		for event in events {
			listeners::bind_field(&self.0, event.event_type())
		}
	}

	fn unbind(&self, events: &[MutationEvent]) {
		for event in events {
			listeners::unbind_field(&self.0, event.event_type())
		}
	}
}

/// A `<form>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomForm(pub HtmlFormElement);

impl Form for DomForm {
	type Key = u32;
	type Field = DomField;

	fn key(&self) -> u32 {
		element_key(&self.0)
	}

	fn fields(&self, selector: &str) -> Vec<DomField> {
		match self.0.query_selector_all(selector) {
			Ok(node_list) => elements(&node_list).map(DomField).collect(),
			Err(error) => {
				error!("Failed to select fields with {:?}: {:?}", selector, error);
				Vec::new()
			}
		}
	}

	fn set_dirty_marker(&self, class: &str, dirty: bool) {
		toggle_class(&self.0, class, dirty)
	}

	fn dispatch(&self, event: StateEvent) {
		let init = CustomEventInit::new();
		init.set_bubbles(true);
		init.set_detail(&self.0);
		let custom_event = match CustomEvent::new_with_event_init_dict(event.event_type(), &init) {
			Ok(custom_event) => custom_event,
			Err(error) => return error!("Failed to create {:?}: {:?}", event.event_type(), error),
		};
		if let Err(error) = self.0.dispatch_event(&custom_event) {
			error!("Failed to dispatch {:?}: {:?}", event.event_type(), error)
		}
	}

	fn is_connected(&self) -> bool {
		self.0.is_connected()
	}

	fn set_submit_enabled(&self, enabled: bool) {
		let node_list = match self.0.query_selector_all("[type=\"submit\"]") {
			Ok(node_list) => node_list,
			Err(error) => return error!("Failed to select submit controls: {:?}", error),
		};
		for element in elements(&node_list) {
			if let Some(button) = element.dyn_ref::<HtmlButtonElement>() {
				button.set_disabled(!enabled)
			} else if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
				input.set_disabled(!enabled)
			} else {
				warn!("Unexpected submit control {:?}.", element.tag_name())
			}
		}
	}
}

/// Form-level events routed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormEvent {
	Submit,
	Reset,
	Rescan,
	Reinitialize,
	CheckForm,
}

fn with_trackers<R>(f: impl FnOnce(&mut Trackers<DomForm>) -> R) -> R {
	TRACKERS.with(|trackers| f(&mut trackers.try_borrow_mut().expect_throw("dirty-form-dom bug: Re-entrant registry access.")))
}

/// Runs `operation` on the registry, then emits its transition with the registry released.
fn run(operation: impl FnOnce(&mut Trackers<DomForm>) -> Result<Option<Transition<DomForm>>, NotInitializedError>) -> Result<(), NotInitializedError> {
	if let Some(transition) = with_trackers(operation)? {
		transition.emit()
	}
	Ok(())
}

fn emit_all(transitions: Vec<Transition<DomForm>>) {
	for transition in transitions {
		transition.emit()
	}
}

/// Starts tracking `form` with `config`.
///
/// Calling this again on the same form replaces the configuration and starts over from fresh baselines.
#[instrument(skip(config))]
pub fn attach(form: &HtmlFormElement, config: Config<DomForm>) {
	listeners::bind_form(form);
	if let Some(transition) = with_trackers(|trackers| trackers.initialize(DomForm(form.clone()), config)) {
		transition.emit()
	}
}

/// Starts tracking `form` with layered [`Settings`]: those stored by a previous call (or the defaults),
/// then the form's `data-*` attributes, then `explicit`.
#[instrument(skip(explicit))]
pub fn arsis_dirty_form(form: &HtmlFormElement, explicit: &SettingsPatch) {
	let dom_form = DomForm(form.clone());
	let key = dom_form.key();

	let stored = SETTINGS.with(|settings| settings.borrow().get(&key).cloned());
	let settings = Settings::layered(stored, |name| form.get_attribute(&format!("data-{}", name)), explicit);
	trace!(?settings, "Layered settings.");
	SETTINGS.with(|stored| stored.borrow_mut().insert(key, settings.clone()));

	listeners::bind_form(form);
	emit_all(with_trackers(|trackers| settings.apply(trackers, &dom_form)));
}

/// Applies [`arsis_dirty_form`] without overrides to every `form.arsis-dirty-form` in the document.
#[instrument]
pub fn auto_bind() {
	let document = match web_sys::window().and_then(|window| window.document()) {
		Some(document) => document,
		None => return error!("No document to bind to."),
	};
	let node_list = match document.query_selector_all(&format!("form.{}", AUTO_BIND_CLASS)) {
		Ok(node_list) => node_list,
		Err(error) => return error!("Failed to select forms: {:?}", error),
	};
	for form in elements(&node_list).filter_map(|element| element.dyn_into::<HtmlFormElement>().ok()) {
		arsis_dirty_form(&form, &SettingsPatch::default())
	}
}

/// # Errors
///
/// Iff `form` isn't tracked.
pub fn is_dirty(form: &HtmlFormElement) -> Result<bool, NotInitializedError> {
	with_trackers(|trackers| trackers.is_dirty(&DomForm(form.clone())))
}

/// Calls `handler` after each dirty/clean transition of `form`.
///
/// # Errors
///
/// Iff `form` isn't tracked.
pub fn on_state_change(form: &HtmlFormElement, handler: impl 'static + Fn(&DomForm)) -> Result<(), NotInitializedError> {
	with_trackers(|trackers| trackers.on_state_change(&DomForm(form.clone()), handler))
}

/// # Errors
///
/// Iff `form` isn't tracked.
pub fn mark_clean(form: &HtmlFormElement) -> Result<(), NotInitializedError> {
	run(|trackers| trackers.mark_clean(&DomForm(form.clone())))
}

/// # Errors
///
/// Iff `form` isn't tracked.
pub fn rescan(form: &HtmlFormElement) -> Result<(), NotInitializedError> {
	run(|trackers| trackers.rescan(&DomForm(form.clone())))
}

/// # Errors
///
/// Iff `form` isn't tracked.
pub fn reinitialize(form: &HtmlFormElement) -> Result<(), NotInitializedError> {
	run(|trackers| trackers.reinitialize(&DomForm(form.clone())))
}

/// # Errors
///
/// Iff `form` isn't tracked.
pub fn check_form(form: &HtmlFormElement) -> Result<(), NotInitializedError> {
	run(|trackers| trackers.check_form(&DomForm(form.clone())))
}

/// The message to confirm leaving the page with right now, if any.
///
/// Forms that were removed from the document are forgotten here, along with their stored [`Settings`].
#[must_use]
pub fn unload_confirmation() -> Option<String> {
	let (message, pruned) = with_trackers(|trackers| {
		let pruned = trackers.prune_disconnected();
		(trackers.before_unload(js_sys::Date::now()), pruned)
	});
	if !pruned.is_empty() {
		SETTINGS.with(|settings| {
			let mut settings = settings.borrow_mut();
			for key in &pruned {
				settings.remove(key);
			}
		})
	}
	message
}

pub(crate) fn field_mutated(event: &Event) {
	let field = match event.current_target().and_then(|target| target.dyn_into::<Element>().ok()) {
		Some(field) => field,
		None => return error!("Mutation event without element target."),
	};
	let form = match field.closest("form") {
		Ok(Some(form)) => form.unchecked_into::<HtmlFormElement>(),
		Ok(None) => return trace!("Field is not inside a form anymore."),
		Err(error) => return error!("Failed to find the field's form: {:?}", error),
	};

	if let Err(error) = run(|trackers| trackers.check_field(&DomForm(form), &DomField(field))) {
		warn!("Mutation event on a field of an untracked form: {}", error)
	}
}

pub(crate) fn form_event(form_event: FormEvent, event: &Event) {
	let form = match event.current_target().and_then(|target| target.dyn_into::<HtmlFormElement>().ok()) {
		Some(form) => DomForm(form),
		None => return error!("Form event without form target."),
	};

	let result = run(|trackers| match form_event {
		FormEvent::Submit => trackers.submitted(&form),
		FormEvent::Reset => trackers.reset(&form),
		FormEvent::Rescan => trackers.rescan(&form),
		FormEvent::Reinitialize => trackers.reinitialize(&form),
		FormEvent::CheckForm => trackers.check_form(&form),
	});
	if let Err(error) = result {
		warn!("{:?} on an untracked form: {}", form_event, error)
	}
}

pub(crate) fn before_unload(event: &BeforeUnloadEvent) {
	if let Some(message) = unload_confirmation() {
		event.prevent_default();
		event.set_return_value(&message);
	}
}

fn to_js_error(error: NotInitializedError) -> JsValue {
	JsValue::from_str(&error.to_string())
}

/// Tracks `form` using the settings from its `data-*` attributes.
#[wasm_bindgen(js_name = arsisDirtyForm)]
pub fn js_arsis_dirty_form(form: &HtmlFormElement) {
	arsis_dirty_form(form, &SettingsPatch::default())
}

#[wasm_bindgen(js_name = autoBind)]
pub fn js_auto_bind() {
	auto_bind()
}

/// # Errors
///
/// Throws iff `form` isn't tracked.
#[wasm_bindgen(js_name = isDirty)]
pub fn js_is_dirty(form: &HtmlFormElement) -> Result<bool, JsValue> {
	is_dirty(form).map_err(to_js_error)
}

/// # Errors
///
/// Throws iff `form` isn't tracked.
#[wasm_bindgen(js_name = markClean)]
pub fn js_mark_clean(form: &HtmlFormElement) -> Result<(), JsValue> {
	mark_clean(form).map_err(to_js_error)
}

/// # Errors
///
/// Throws iff `form` isn't tracked.
#[wasm_bindgen(js_name = rescan)]
pub fn js_rescan(form: &HtmlFormElement) -> Result<(), JsValue> {
	rescan(form).map_err(to_js_error)
}

/// # Errors
///
/// Throws iff `form` isn't tracked.
#[wasm_bindgen(js_name = reinitialize)]
pub fn js_reinitialize(form: &HtmlFormElement) -> Result<(), JsValue> {
	reinitialize(form).map_err(to_js_error)
}
