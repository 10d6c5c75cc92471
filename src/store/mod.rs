pub mod autosave;
pub mod conflict;
pub mod reorder;

use std::time::Instant;

use crate::model::{Element, ElementOption, ElementType, OptionType, TypeConfig};
use autosave::AutoSaveTimer;
use conflict::{element_conflict, option_conflict};

/// Validated draft for a new element. All three fields must be non-empty
/// before the element can be appended.
#[derive(Debug, Clone)]
pub struct NewElement {
    pub id: String,
    pub title: String,
    pub element_type: ElementType,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("element '{id}' with type '{element_type}' already exists")]
    ElementConflict {
        id: String,
        element_type: ElementType,
    },
    #[error("option with value '{value}' already exists")]
    OptionConflict { value: String },
    #[error("unknown element: {0}")]
    UnknownElement(String),
    #[error("no option at index {0}")]
    UnknownOption(usize),
    #[error("element '{0}' does not carry options")]
    NoOptions(String),
    #[error("new element requires a non-empty {0}")]
    MissingField(&'static str),
}

/// Authoritative local copy of the element sequence being edited.
///
/// Structural changes (add/remove/reorder) commit to the host immediately via
/// the `on_save` callback. Field-level edits mark the store pending and arm a
/// single debounced deadline; the owner drives `tick` from its event loop and
/// the accumulated edits go out as one batch. A failed operation leaves the
/// collection exactly as it was.
pub struct ElementStore {
    elements: Vec<Element>,
    pending: bool,
    timer: AutoSaveTimer,
    on_save: Box<dyn FnMut(&[Element])>,
}

impl ElementStore {
    pub fn new(elements: Vec<Element>, on_save: impl FnMut(&[Element]) + 'static) -> Self {
        ElementStore {
            elements,
            pending: false,
            timer: AutoSaveTimer::default(),
            on_save: Box::new(on_save),
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, uid: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.uid == uid)
    }

    pub fn has_pending_edits(&self) -> bool {
        self.pending
    }

    /// Append a fully defaulted element built from the draft. Fails on an
    /// empty id/title or an `(id, type)` collision; commits immediately on
    /// success and returns the new element's uid.
    pub fn add(&mut self, draft: NewElement) -> Result<String, StoreError> {
        if draft.id.trim().is_empty() {
            return Err(StoreError::MissingField("id"));
        }
        if draft.title.trim().is_empty() {
            return Err(StoreError::MissingField("title"));
        }
        if element_conflict(&self.elements, None, &draft.id, draft.element_type) {
            return Err(StoreError::ElementConflict {
                id: draft.id,
                element_type: draft.element_type,
            });
        }
        let element = Element::new(draft.id, draft.title, draft.element_type);
        let uid = element.uid.clone();
        self.elements.push(element);
        self.commit();
        Ok(uid)
    }

    /// Remove by identity; commits immediately.
    pub fn remove(&mut self, uid: &str) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        self.elements.remove(idx);
        self.commit();
        Ok(())
    }

    /// Apply a field-level mutation. The mutation runs against a scratch
    /// copy; if it moves the element onto another element's `(id, type)`
    /// pair the edit is rejected and the stored element is untouched.
    pub fn update(
        &mut self,
        uid: &str,
        mutate: impl FnOnce(&mut Element),
    ) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        let mut updated = self.elements[idx].clone();
        mutate(&mut updated);
        updated.uid = self.elements[idx].uid.clone();
        let element_type = updated.element_type();
        let identity_changed = updated.id != self.elements[idx].id
            || element_type != self.elements[idx].element_type();
        if identity_changed
            && element_conflict(&self.elements, Some(uid), &updated.id, element_type)
        {
            tracing::warn!(
                id = %updated.id,
                %element_type,
                "edit discarded: identity collides with an existing element"
            );
            return Err(StoreError::ElementConflict {
                id: updated.id,
                element_type,
            });
        }
        self.elements[idx] = updated;
        self.mark_pending();
        Ok(())
    }

    /// Change the declared type, replacing all type-specific fields with the
    /// target type's default set.
    pub fn change_type(&mut self, uid: &str, new_type: ElementType) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        if self.elements[idx].element_type() == new_type {
            return Ok(());
        }
        let id = self.elements[idx].id.clone();
        if element_conflict(&self.elements, Some(uid), &id, new_type) {
            return Err(StoreError::ElementConflict {
                id,
                element_type: new_type,
            });
        }
        self.elements[idx].config = TypeConfig::defaults_for(new_type);
        self.mark_pending();
        Ok(())
    }

    /// Move an element by index. A missing destination is a no-op; a real
    /// move commits immediately.
    pub fn reorder(&mut self, from: usize, to: Option<usize>) {
        if to.is_none() || from >= self.elements.len() {
            return;
        }
        reorder::move_item(&mut self.elements, from, to);
        self.commit();
    }

    /// Append a default option to a select-family element.
    pub fn add_option(&mut self, uid: &str) -> Result<String, StoreError> {
        let idx = self.index_of(uid)?;
        let options = self.elements[idx]
            .config
            .options_mut()
            .ok_or_else(|| StoreError::NoOptions(uid.to_string()))?;
        let option = ElementOption::default();
        if option_conflict(options, None, &option.value) {
            return Err(StoreError::OptionConflict {
                value: option.value.derive_id(),
            });
        }
        let id = option.id.clone();
        options.push(option);
        self.mark_pending();
        Ok(id)
    }

    /// Apply a field-level mutation to the option at `option_idx`. Options
    /// are addressed by position: derived ids can repeat across the
    /// string/number types, so only the index is unambiguous. The id is
    /// recomputed from the (possibly changed) value; a value collision with
    /// a sibling rejects the edit and leaves the option untouched.
    pub fn update_option(
        &mut self,
        uid: &str,
        option_idx: usize,
        mutate: impl FnOnce(&mut ElementOption),
    ) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        let options = self.elements[idx]
            .config
            .options_mut()
            .ok_or_else(|| StoreError::NoOptions(uid.to_string()))?;
        if option_idx >= options.len() {
            return Err(StoreError::UnknownOption(option_idx));
        }
        let mut updated = options[option_idx].clone();
        mutate(&mut updated);
        updated.id = updated.value.derive_id();
        if updated.value != options[option_idx].value
            && option_conflict(options, Some(option_idx), &updated.value)
        {
            tracing::warn!(value = %updated.id, "option edit discarded: duplicate value");
            return Err(StoreError::OptionConflict { value: updated.id });
        }
        options[option_idx] = updated;
        self.mark_pending();
        Ok(())
    }

    /// Convert an option between string and number, coercing the value and
    /// recomputing its id.
    pub fn convert_option_type(
        &mut self,
        uid: &str,
        option_idx: usize,
        target: OptionType,
    ) -> Result<(), StoreError> {
        self.update_option(uid, option_idx, |opt| {
            opt.value = opt.value.convert_to(target);
        })
    }

    pub fn remove_option(&mut self, uid: &str, option_idx: usize) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        let options = self.elements[idx]
            .config
            .options_mut()
            .ok_or_else(|| StoreError::NoOptions(uid.to_string()))?;
        if option_idx >= options.len() {
            return Err(StoreError::UnknownOption(option_idx));
        }
        options.remove(option_idx);
        self.mark_pending();
        Ok(())
    }

    pub fn reorder_options(
        &mut self,
        uid: &str,
        from: usize,
        to: Option<usize>,
    ) -> Result<(), StoreError> {
        let idx = self.index_of(uid)?;
        let options = self.elements[idx]
            .config
            .options_mut()
            .ok_or_else(|| StoreError::NoOptions(uid.to_string()))?;
        if to.is_some() {
            reorder::move_item(options, from, to);
            self.mark_pending();
        }
        Ok(())
    }

    /// Commit pending field edits now and disarm the auto-save deadline.
    /// Returns whether a commit went out.
    pub fn save_now(&mut self) -> bool {
        if self.pending {
            self.commit();
            true
        } else {
            self.timer.cancel();
            false
        }
    }

    /// Poll the auto-save deadline; commits the pending batch once the
    /// inactivity window has elapsed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.pending && self.timer.fire(now) {
            self.commit();
            true
        } else {
            false
        }
    }

    /// Host-driven reset: the external collection changed, so the local copy
    /// is replaced wholesale and pending state is dropped.
    pub fn sync(&mut self, elements: Vec<Element>) {
        self.elements = elements;
        self.pending = false;
        self.timer.cancel();
    }

    fn index_of(&self, uid: &str) -> Result<usize, StoreError> {
        self.elements
            .iter()
            .position(|e| e.uid == uid)
            .ok_or_else(|| StoreError::UnknownElement(uid.to_string()))
    }

    fn mark_pending(&mut self) {
        self.pending = true;
        self.timer.arm(Instant::now());
    }

    fn commit(&mut self) {
        self.pending = false;
        self.timer.cancel();
        tracing::debug!(count = self.elements.len(), "committing element collection");
        (self.on_save)(&self.elements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionValue;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn store_with(elements: Vec<Element>) -> (ElementStore, Rc<RefCell<Vec<Vec<Element>>>>) {
        let commits: Rc<RefCell<Vec<Vec<Element>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = commits.clone();
        let store = ElementStore::new(elements, move |els: &[Element]| {
            sink.borrow_mut().push(els.to_vec());
        });
        (store, commits)
    }

    fn select_with_options(options: Vec<ElementOption>) -> Element {
        let mut element = Element::new("select", "Select", ElementType::Select);
        element.config = TypeConfig::Select {
            options,
            value: serde_json::Value::Null,
        };
        element
    }

    fn str_option(value: &str) -> ElementOption {
        ElementOption {
            id: value.to_string(),
            label: "label".into(),
            value: OptionValue::String {
                value: value.to_string(),
            },
            icon: None,
        }
    }

    #[test]
    fn add_appends_defaults_and_commits() {
        let (mut store, commits) = store_with(vec![]);
        let uid = store
            .add(NewElement {
                id: "newSlider".into(),
                title: "New Slider".into(),
                element_type: ElementType::Slider,
            })
            .unwrap();
        assert_eq!(commits.borrow().len(), 1);
        let element = store.element(&uid).unwrap();
        match &element.config {
            TypeConfig::Slider {
                min, max, step, ..
            } => {
                assert_eq!((*min, *max, *step), (0.0, 100.0, 1.0));
            }
            other => panic!("expected slider defaults, got {other:?}"),
        }
    }

    #[test]
    fn add_rejects_conflicting_pair_and_leaves_state() {
        let existing = Element::new("id", "A", ElementType::String);
        let (mut store, commits) = store_with(vec![existing]);
        let err = store
            .add(NewElement {
                id: "id".into(),
                title: "B".into(),
                element_type: ElementType::String,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ElementConflict { .. }));
        assert_eq!(store.elements().len(), 1);
        assert!(commits.borrow().is_empty());

        // Same id with a different type is fine.
        store
            .add(NewElement {
                id: "id".into(),
                title: "B".into(),
                element_type: ElementType::Number,
            })
            .unwrap();
        assert_eq!(store.elements().len(), 2);
    }

    #[test]
    fn add_requires_id_and_title() {
        let (mut store, _) = store_with(vec![]);
        assert_eq!(
            store.add(NewElement {
                id: "".into(),
                title: "T".into(),
                element_type: ElementType::String,
            }),
            Err(StoreError::MissingField("id"))
        );
        assert_eq!(
            store.add(NewElement {
                id: "x".into(),
                title: " ".into(),
                element_type: ElementType::String,
            }),
            Err(StoreError::MissingField("title"))
        );
    }

    #[test]
    fn remove_commits_immediately() {
        let element = Element::new("id", "A", ElementType::String);
        let uid = element.uid.clone();
        let (mut store, commits) = store_with(vec![element]);
        store.remove(&uid).unwrap();
        assert!(store.elements().is_empty());
        assert_eq!(commits.borrow().len(), 1);
        assert!(matches!(
            store.remove(&uid),
            Err(StoreError::UnknownElement(_))
        ));
    }

    #[test]
    fn field_edits_batch_into_one_commit() {
        let element = Element::new("string", "S", ElementType::String);
        let uid = element.uid.clone();
        let (mut store, commits) = store_with(vec![element]);

        store.update(&uid, |e| e.width = Some(10)).unwrap();
        store.update(&uid, |e| e.width = Some(20)).unwrap();
        assert!(store.has_pending_edits());
        assert!(commits.borrow().is_empty());

        // Before the window: nothing fires.
        assert!(!store.tick(Instant::now()));
        // After the window: exactly one commit with the final value.
        assert!(store.tick(Instant::now() + Duration::from_secs(1)));
        assert!(!store.tick(Instant::now() + Duration::from_secs(2)));
        let commits = commits.borrow();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0][0].width, Some(20));
    }

    #[test]
    fn update_rejects_identity_collision() {
        let one = Element::new("id", "A", ElementType::String);
        let two = Element::new("other", "B", ElementType::String);
        let uid = two.uid.clone();
        let (mut store, _) = store_with(vec![one, two]);
        let err = store.update(&uid, |e| e.id = "id".into()).unwrap_err();
        assert!(matches!(err, StoreError::ElementConflict { .. }));
        assert_eq!(store.elements()[1].id, "other");
        assert!(!store.has_pending_edits());
    }

    #[test]
    fn change_type_applies_default_set() {
        let element = Element::new("id", "A", ElementType::String);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);
        store.change_type(&uid, ElementType::Code).unwrap();
        assert!(matches!(
            store.element(&uid).unwrap().config,
            TypeConfig::Code {
                language: crate::model::CodeLanguage::Javascript,
                height: crate::model::CODE_EDITOR_HEIGHT,
                ..
            }
        ));
    }

    #[test]
    fn change_type_rejects_existing_pair_but_allows_unique() {
        let one = Element::new("id", "A", ElementType::String);
        let two = Element::new("id", "B", ElementType::Number);
        let uid = two.uid.clone();
        let (mut store, _) = store_with(vec![one, two]);
        let err = store.change_type(&uid, ElementType::String).unwrap_err();
        assert!(matches!(err, StoreError::ElementConflict { .. }));
        assert_eq!(store.elements()[1].element_type(), ElementType::Number);

        store.change_type(&uid, ElementType::Slider).unwrap();
        assert_eq!(store.elements()[1].element_type(), ElementType::Slider);
    }

    #[test]
    fn reorder_swaps_and_commits_keeping_uids() {
        let a = Element::new("a", "A", ElementType::String);
        let b = Element::new("b", "B", ElementType::Textarea);
        let (a_uid, b_uid) = (a.uid.clone(), b.uid.clone());
        let (mut store, commits) = store_with(vec![a, b]);

        store.reorder(1, Some(0));
        assert_eq!(store.elements()[0].uid, b_uid);
        assert_eq!(store.elements()[1].uid, a_uid);
        assert_eq!(commits.borrow().len(), 1);
    }

    #[test]
    fn reorder_without_destination_is_a_noop() {
        let a = Element::new("a", "A", ElementType::String);
        let b = Element::new("b", "B", ElementType::Textarea);
        let (mut store, commits) = store_with(vec![a, b]);
        store.reorder(1, None);
        assert_eq!(store.elements()[0].id, "a");
        assert!(commits.borrow().is_empty());
    }

    #[test]
    fn save_now_flushes_pending_batch() {
        let element = Element::new("string", "S", ElementType::String);
        let uid = element.uid.clone();
        let (mut store, commits) = store_with(vec![element]);
        store.update(&uid, |e| e.tooltip = "hint".into()).unwrap();
        assert!(store.save_now());
        assert_eq!(commits.borrow().len(), 1);
        // Nothing pending afterwards; the deadline is gone.
        assert!(!store.save_now());
        assert!(!store.tick(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn sync_replaces_local_copy_and_clears_pending() {
        let element = Element::new("string", "S", ElementType::String);
        let uid = element.uid.clone();
        let (mut store, commits) = store_with(vec![element]);
        store.update(&uid, |e| e.tooltip = "hint".into()).unwrap();

        store.sync(vec![Element::new("select", "S2", ElementType::Select)]);
        assert_eq!(store.elements().len(), 1);
        assert_eq!(store.elements()[0].id, "select");
        assert!(!store.has_pending_edits());
        assert!(!store.tick(Instant::now() + Duration::from_secs(1)));
        assert!(commits.borrow().is_empty());
    }

    #[test]
    fn option_lifecycle() {
        let element = select_with_options(vec![str_option("111")]);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);

        // Add keeps the existing option and appends the default one.
        let new_id = store.add_option(&uid).unwrap();
        assert_eq!(new_id, crate::model::OPTION_DEFAULT_ID);
        assert_eq!(store.element(&uid).unwrap().config.options().unwrap().len(), 2);

        // Updating a value recomputes the id.
        store
            .update_option(&uid, 0, |opt| {
                opt.value = OptionValue::String {
                    value: "123".into(),
                };
            })
            .unwrap();
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[0].id, "123");

        store.remove_option(&uid, 0).unwrap();
        assert_eq!(store.element(&uid).unwrap().config.options().unwrap().len(), 1);
        assert_eq!(
            store.remove_option(&uid, 5),
            Err(StoreError::UnknownOption(5))
        );
    }

    #[test]
    fn option_value_collision_is_rejected() {
        let element = select_with_options(vec![str_option("111"), str_option("100")]);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);

        let err = store
            .update_option(&uid, 1, |opt| {
                opt.value = OptionValue::String {
                    value: "111".into(),
                };
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::OptionConflict { .. }));
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[1].id, "100");
    }

    #[test]
    fn option_collision_detected_across_shared_derived_ids() {
        // A string "123" and a number 123 coexist (distinct values) but share
        // the derived id "123"; editing the number option onto the string's
        // value must still be rejected.
        let number_option = ElementOption {
            id: "123".into(),
            label: "label".into(),
            value: OptionValue::Number { value: 123.0 },
            icon: None,
        };
        let element = select_with_options(vec![str_option("123"), number_option]);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);

        let err = store
            .update_option(&uid, 1, |opt| {
                opt.value = OptionValue::String {
                    value: "123".into(),
                };
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::OptionConflict { .. }));
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[1].value, OptionValue::Number { value: 123.0 });
    }

    #[test]
    fn option_type_conversion_coerces_value() {
        let element = select_with_options(vec![str_option("123")]);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);

        store
            .convert_option_type(&uid, 0, OptionType::Number)
            .unwrap();
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[0].value, OptionValue::Number { value: 123.0 });
        assert_eq!(options[0].id, "123");
    }

    #[test]
    fn option_reorder() {
        let element = select_with_options(vec![str_option("111"), str_option("100")]);
        let uid = element.uid.clone();
        let (mut store, _) = store_with(vec![element]);
        store.reorder_options(&uid, 1, Some(0)).unwrap();
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[0].id, "100");
        store.reorder_options(&uid, 1, None).unwrap();
        let options = store.element(&uid).unwrap().config.options().unwrap();
        assert_eq!(options[0].id, "100");
    }
}
