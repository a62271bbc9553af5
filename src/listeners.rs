use crate::dom;
use js_sys::Function;
use tracing::{error, trace, trace_span};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{BeforeUnloadEvent, Event, EventTarget};

/// Form-level event types and what they trigger.
pub(crate) const FORM_EVENTS: [(&str, dom::FormEvent); 5] = [
	("submit", dom::FormEvent::Submit),
	("reset", dom::FormEvent::Reset),
	("rescan.areYouSure", dom::FormEvent::Rescan),
	("reinitialize.areYouSure", dom::FormEvent::Reinitialize),
	("checkform.areYouSure", dom::FormEvent::CheckForm),
];

/// Closures shared by all tracked elements, so that adding the same listener twice is deduplicated by the DOM.
pub(crate) struct Listeners {
	field_mutated: Closure<dyn Fn(Event)>,
	form_events: [Closure<dyn Fn(Event)>; 5],
	before_unload: Closure<dyn Fn(BeforeUnloadEvent)>,
}

thread_local! {
	static LISTENERS: Listeners = Listeners::new();
}

impl Listeners {
	fn new() -> Self {
		let form_listener = |form_event: dom::FormEvent| {
			Closure::wrap(Box::new(move |event: Event| {
				let span = trace_span!("form_listener", ?form_event, event_type = %event.type_());
				let _enter = span.enter();
				dom::form_event(form_event, &event)
			}) as Box<dyn Fn(Event)>)
		};

		trace!("Created shared listeners.");
		Self {
			field_mutated: Closure::wrap(Box::new(move |event: Event| {
				let span = trace_span!("field_listener", event_type = %event.type_());
				let _enter = span.enter();
				dom::field_mutated(&event)
			}) as Box<dyn Fn(Event)>),
			form_events: [
				form_listener(FORM_EVENTS[0].1),
				form_listener(FORM_EVENTS[1].1),
				form_listener(FORM_EVENTS[2].1),
				form_listener(FORM_EVENTS[3].1),
				form_listener(FORM_EVENTS[4].1),
			],
			before_unload: Closure::wrap(Box::new(move |event: BeforeUnloadEvent| dom::before_unload(&event)) as Box<dyn Fn(BeforeUnloadEvent)>),
		}
	}
}

fn add(target: &EventTarget, event_type: &str, listener: &Function) {
	if let Err(error) = target.add_event_listener_with_callback(event_type, listener) {
		error!("Failed to add {:?} listener: {:?}", event_type, error)
	}
}

fn remove(target: &EventTarget, event_type: &str, listener: &Function) {
	if let Err(error) = target.remove_event_listener_with_callback(event_type, listener) {
		error!("Failed to remove {:?} listener: {:?}", event_type, error)
	}
}

pub(crate) fn bind_field(target: &EventTarget, event_type: &str) {
	LISTENERS.with(|listeners| add(target, event_type, listeners.field_mutated.as_ref().unchecked_ref()))
}

pub(crate) fn unbind_field(target: &EventTarget, event_type: &str) {
	LISTENERS.with(|listeners| remove(target, event_type, listeners.field_mutated.as_ref().unchecked_ref()))
}

pub(crate) fn bind_form(target: &EventTarget) {
	LISTENERS.with(|listeners| {
		for ((event_type, _), listener) in FORM_EVENTS.iter().zip(&listeners.form_events) {
			add(target, event_type, listener.as_ref().unchecked_ref())
		}
	})
}

/// Installs the page's unload interceptor.
pub(crate) fn bind_before_unload() {
	let window = match web_sys::window() {
		Some(window) => window,
		None => return error!("No `window` to guard against unloading."),
	};
	LISTENERS.with(|listeners| add(&window, "beforeunload", listeners.before_unload.as_ref().unchecked_ref()));
	trace!("Bound unload interceptor.");
}
