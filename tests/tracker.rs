use dirty_form_dom::{
	host::{MutationEvent, StateEvent},
	tracker::Config,
	value::{read_value, FieldValue},
	NotInitializedError, Trackers,
};
use std::{cell::RefCell, rc::Rc};

use mock_form_::{emit, fire, MockField, MockForm};

fn tracked(fields: &[&MockField], config: Config<MockForm>) -> (Trackers<MockForm>, MockForm) {
	let form = MockForm::new(1, fields);
	let mut trackers = Trackers::new();
	emit(trackers.initialize(form.clone(), config));
	(trackers, form)
}

#[test]
fn alice() {
	let name = MockField::text(1, "name", "Alice");
	let subscribed = MockField::checkbox(2, "subscribed", false);
	let (mut trackers, form) = tracked(&[&name, &subscribed], Config::default());
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!form.dirty_marker());

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
	assert!(form.dirty_marker());
	assert!(name.changed_marker());
	assert!(!subscribed.changed_marker());
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change]);

	name.set_value("Alice");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!form.dirty_marker());
	assert!(!name.changed_marker());
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change, StateEvent::Clean, StateEvent::Change]);
}

#[test]
fn initialize_twice() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());
	emit(trackers.initialize(form.clone(), Config::default()));
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	for event in MutationEvent::ALL.iter().copied() {
		assert_eq!(name.binding_count(event), 1);
	}

	let changes = Rc::new(RefCell::new(0));
	trackers
		.on_state_change(&form, {
			let changes = Rc::clone(&changes);
			move |_| *changes.borrow_mut() += 1
		})
		.unwrap();

	name.set_value("Bob");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(*changes.borrow(), 1);
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change]);
}

#[test]
fn initialize_replaces_event_bindings() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());

	let config = Config {
		mutation_events: vec![MutationEvent::Change],
		..Config::default()
	};
	emit(trackers.initialize(form, config));
	assert_eq!(name.binding_count(MutationEvent::Change), 1);
	assert_eq!(name.binding_count(MutationEvent::Input), 0);
	assert_eq!(name.binding_count(MutationEvent::KeyUp), 0);
}

#[test]
fn initialize_dirty_form_starts_clean() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));

	emit(trackers.initialize(form.clone(), Config::default()));
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change, StateEvent::Clean, StateEvent::Change]);

	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn repeated_mutation_notifies_once() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	fire(&mut trackers, &form, &name).unwrap();
	emit(trackers.check_form(&form).unwrap());
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change]);
}

#[test]
fn notification_order() {
	let name = MockField::text(1, "name", "Alice");
	let callback_seen = Rc::new(RefCell::new(Vec::new()));
	let config = Config {
		change_notification: Some(Rc::new({
			let callback_seen = Rc::clone(&callback_seen);
			move |form: &MockForm, dirty: bool| callback_seen.borrow_mut().push((dirty, form.events().len()))
		})),
		..Config::default()
	};
	let (mut trackers, form) = tracked(&[&name], config);

	let handler_seen = Rc::new(RefCell::new(Vec::new()));
	trackers
		.on_state_change(&form, {
			let handler_seen = Rc::clone(&handler_seen);
			move |form| handler_seen.borrow_mut().push(form.events())
		})
		.unwrap();

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();

	// The callback runs before any event is dispatched, handlers after both.
	assert_eq!(*callback_seen.borrow(), [(true, 0)]);
	assert_eq!(*handler_seen.borrow(), [vec![StateEvent::Dirty, StateEvent::Change]]);
}

#[test]
fn reentrant_check_does_not_fire_twice() {
	let name = MockField::text(1, "name", "Alice");
	let form = MockForm::new(1, &[&name]);
	let trackers = Rc::new(RefCell::new(Trackers::new()));
	emit(trackers.borrow_mut().initialize(form.clone(), Config::default()));

	let nested = Rc::new(RefCell::new(Vec::new()));
	trackers
		.borrow_mut()
		.on_state_change(&form, {
			let trackers = Rc::downgrade(&trackers);
			let nested = Rc::clone(&nested);
			move |form| {
				let trackers = trackers.upgrade().unwrap();
				let transition = trackers.borrow_mut().check_form(form).unwrap();
				nested.borrow_mut().push(transition.is_some());
			}
		})
		.unwrap();

	name.set_value("Alicia");
	let transition = trackers.borrow_mut().check_field(&form, &name).unwrap();
	emit(transition);

	assert_eq!(*nested.borrow(), [false]);
	assert_eq!(form.events(), [StateEvent::Dirty, StateEvent::Change]);
}

#[test]
fn mark_clean_keeps_baselines() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	emit(trackers.mark_clean(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!form.dirty_marker());

	// Still diverges from the original "Alice".
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));

	name.set_value("Alice");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn mark_clean_on_clean_form_is_silent() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config::default());

	assert!(trackers.mark_clean(&form).unwrap().is_none());
	assert!(form.events().is_empty());
}

#[test]
fn submit_and_reset() {
	let name = MockField::text(1, "name", "Alice");
	let config = Config {
		remove_dirty_marker_on_submit: false,
		..Config::default()
	};
	let (mut trackers, form) = tracked(&[&name], config);

	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	assert!(trackers.submitted(&form).unwrap().is_none());
	assert_eq!(trackers.is_dirty(&form), Ok(true));

	emit(trackers.reset(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	emit(trackers.initialize(form.clone(), Config::default()));
	name.set_value("Bob");
	fire(&mut trackers, &form, &name).unwrap();
	emit(trackers.submitted(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn ignored_fields_never_dirty() {
	let marked = MockField::text(1, "marked", "a").ignored();
	let unnamed = MockField::text(2, "unnamed", "b").unnamed();
	let (mut trackers, form) = tracked(&[&marked, &unnamed], Config::default());
	assert!(trackers.get(&form).unwrap().field(&1).unwrap().is_ignored());
	assert!(trackers.get(&form).unwrap().field(&2).unwrap().baseline().is_none());

	marked.set_value("changed");
	unnamed.set_value("changed too");
	fire(&mut trackers, &form, &marked).unwrap();
	fire(&mut trackers, &form, &unnamed).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!marked.changed_marker());
	assert!(form.events().is_empty());

	// The ignore decision is made once, at discovery.
	marked.0.borrow_mut().ignore_marker = false;
	fire(&mut trackers, &form, &marked).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn ignore_markers_added_later_are_disregarded() {
	let name = MockField::text(1, "name", "Alice");
	let note = MockField::text(2, "note", "");
	let (mut trackers, form) = tracked(&[&name, &note], Config::default());

	name.0.borrow_mut().ignore_marker = true;
	note.0.borrow_mut().name = None;
	fire(&mut trackers, &form, &name).unwrap();
	fire(&mut trackers, &form, &note).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!name.changed_marker());
	assert!(form.events().is_empty());

	// Still tracked by value.
	name.set_value("Alicia");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
	assert!(name.changed_marker());

	name.set_value("Alice");
	fire(&mut trackers, &form, &name).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn full_scan_updates_every_marker() {
	let a = MockField::text(1, "a", "1");
	let b = MockField::text(2, "b", "2");
	let c = MockField::text(3, "c", "3");
	let (mut trackers, form) = tracked(&[&a, &b, &c], Config::default());

	a.set_value("one");
	c.set_value("three");
	fire(&mut trackers, &form, &a).unwrap();
	assert!(a.changed_marker());
	assert!(!b.changed_marker());
	assert!(c.changed_marker());

	a.set_value("1");
	fire(&mut trackers, &form, &a).unwrap();
	assert!(!a.changed_marker());
	assert!(c.changed_marker());
	assert_eq!(trackers.is_dirty(&form), Ok(true));
}

#[test]
fn field_kinds() {
	let subscribed = MockField::checkbox(1, "subscribed", false);
	let colors = MockField::select(2, "colors", &["red", "green"]);
	let note = MockField::text(3, "note", "disabled");
	let (mut trackers, form) = tracked(&[&subscribed, &colors, &note], Config::default());

	assert_eq!(read_value(&subscribed), Some(FieldValue::Checked(false)));
	assert_eq!(read_value(&colors), Some(FieldValue::Selected(vec!["red".to_owned(), "green".to_owned()])));

	subscribed.set_checked(true);
	fire(&mut trackers, &form, &subscribed).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
	subscribed.set_checked(false);
	fire(&mut trackers, &form, &subscribed).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	// Same concatenation, different selection.
	colors.set_selected(&["redgreen"]);
	fire(&mut trackers, &form, &colors).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
	colors.set_selected(&["red", "green"]);
	fire(&mut trackers, &form, &colors).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	// A disabled field is never equal to a textual value, even a matching one.
	note.set_disabled(true);
	assert_eq!(read_value(&note), Some(FieldValue::Disabled));
	fire(&mut trackers, &form, &note).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
}

#[test]
fn undiscovered_target_is_clean() {
	let name = MockField::text(1, "name", "Alice");
	let (mut trackers, form) = tracked(&[&name], Config { count_structural_changes: false, ..Config::default() });

	let stranger = MockField::text(9, "stranger", "x");
	emit(trackers.check_field(&form, &stranger).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert!(!stranger.changed_marker());
}

#[test]
fn rescan_counts_structural_changes() {
	let a = MockField::text(1, "a", "1");
	let b = MockField::text(2, "b", "2");
	let c = MockField::text(3, "c", "3");
	let (mut trackers, form) = tracked(&[&a, &b, &c], Config::default());
	assert_eq!(trackers.get(&form).unwrap().original_field_count(), 3);

	let d = MockField::text(4, "d", "4");
	form.push_field(&d);
	emit(trackers.rescan(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(true));
	assert_eq!(d.binding_count(MutationEvent::Input), 1);
	assert_eq!(a.binding_count(MutationEvent::Input), 1);
	assert_eq!(trackers.get(&form).unwrap().field(&4).unwrap().baseline(), Some(&FieldValue::Text("4".to_owned())));
	assert!(!d.changed_marker());

	form.remove_field(&d);
	emit(trackers.check_form(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	form.remove_field(&c);
	emit(trackers.check_form(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(true));
}

#[test]
fn structural_changes_can_be_ignored() {
	let a = MockField::text(1, "a", "1");
	let config = Config {
		count_structural_changes: false,
		..Config::default()
	};
	let (mut trackers, form) = tracked(&[&a], config);

	let b = MockField::text(2, "b", "2");
	form.push_field(&b);
	emit(trackers.rescan(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));

	b.set_value("two");
	fire(&mut trackers, &form, &b).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
}

#[test]
fn rescan_keeps_existing_baselines() {
	let a = MockField::text(1, "a", "1");
	let config = Config {
		count_structural_changes: false,
		..Config::default()
	};
	let (mut trackers, form) = tracked(&[&a], config);

	a.set_value("one");
	form.push_field(&MockField::text(2, "b", "2"));
	emit(trackers.rescan(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(true));

	a.set_value("1");
	fire(&mut trackers, &form, &a).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(false));
}

#[test]
fn reinitialize_takes_new_baselines() {
	let a = MockField::text(1, "a", "1");
	let (mut trackers, form) = tracked(&[&a], Config::default());

	a.set_value("one");
	form.push_field(&MockField::text(2, "b", "2"));
	emit(trackers.reinitialize(&form).unwrap());
	assert_eq!(trackers.is_dirty(&form), Ok(false));
	assert_eq!(trackers.get(&form).unwrap().original_field_count(), 2);
	assert_eq!(a.binding_count(MutationEvent::Change), 1);

	a.set_value("1");
	fire(&mut trackers, &form, &a).unwrap();
	assert_eq!(trackers.is_dirty(&form), Ok(true));
}

#[test]
fn untracked_form() {
	let mut trackers = Trackers::new();
	let form = MockForm::new(7, &[]);
	let field = MockField::text(1, "a", "1");

	assert_eq!(trackers.is_dirty(&form), Err(NotInitializedError));
	assert!(!trackers.is_tracked(&form));
	assert_eq!(trackers.on_state_change(&form, |_| ()), Err(NotInitializedError));
	assert_eq!(trackers.check_field(&form, &field).err(), Some(NotInitializedError));
	assert_eq!(trackers.check_form(&form).err(), Some(NotInitializedError));
	assert_eq!(trackers.rescan(&form).err(), Some(NotInitializedError));
	assert_eq!(trackers.reinitialize(&form).err(), Some(NotInitializedError));
	assert_eq!(trackers.mark_clean(&form).err(), Some(NotInitializedError));
	assert_eq!(trackers.reset(&form).err(), Some(NotInitializedError));
	assert_eq!(trackers.submitted(&form).err(), Some(NotInitializedError));
	assert_eq!(NotInitializedError.to_string(), "no dirty tracker is attached to this form");
}

#[test]
fn dirtiness_is_recomputed_from_scratch() {
	let fields: Vec<_> = (0..4).map(|i| MockField::text(i, &format!("f{}", i), "0")).collect();
	let form = MockForm::new(1, &fields.iter().collect::<Vec<_>>());
	let mut trackers = Trackers::new();
	emit(trackers.initialize(form.clone(), Config::default()));

	// Deterministic pseudo-random walk over field values.
	let mut seed = 0x2545_f491_u32;
	let mut values = vec![0_u32; fields.len()];
	for _ in 0..200 {
		seed ^= seed << 13;
		seed ^= seed >> 17;
		seed ^= seed << 5;
		let i = seed as usize % fields.len();
		values[i] = (seed >> 8) % 3;
		fields[i].set_value(&values[i].to_string());

		fire(&mut trackers, &form, &fields[i]).unwrap();
		let expected = values.iter().any(|value| *value != 0);
		assert_eq!(trackers.is_dirty(&form), Ok(expected));
		assert_eq!(form.dirty_marker(), expected);
	}

	let events = form.events();
	assert!(events.chunks(2).all(|pair| pair[1] == StateEvent::Change));
	assert!(events.chunks(2).zip(events.chunks(2).skip(1)).all(|(a, b)| a[0] != b[0]));
}
