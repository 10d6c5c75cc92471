use crate::model::{Element, ElementOption, ElementType};

/// True iff any entry (other than the candidate's own) carries the same key.
///
/// `is_self` excludes the candidate's prior identity so that updating an
/// entry in place never collides with itself.
pub fn has_conflict<T, K: PartialEq>(
    items: &[T],
    candidate: &K,
    key_of: impl Fn(&T) -> K,
    is_self: impl Fn(&T) -> bool,
) -> bool {
    items
        .iter()
        .any(|item| !is_self(item) && key_of(item) == *candidate)
}

/// Element collision check on the `(id, type)` pair, excluding `skip_uid`.
pub fn element_conflict(
    elements: &[Element],
    skip_uid: Option<&str>,
    id: &str,
    element_type: ElementType,
) -> bool {
    has_conflict(
        elements,
        &(id.to_string(), element_type),
        |e| (e.id.clone(), e.element_type()),
        |e| skip_uid == Some(e.uid.as_str()),
    )
}

/// Option collision check on the value, excluding the option at `skip`.
///
/// Exclusion is positional: derived option ids are not unique across the
/// string/number types (both `"123"` and `123` derive id `"123"`), so only
/// the index names exactly one option.
pub fn option_conflict(
    options: &[ElementOption],
    skip: Option<usize>,
    value: &crate::model::OptionValue,
) -> bool {
    options
        .iter()
        .enumerate()
        .any(|(i, option)| Some(i) != skip && option.value == *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionValue;

    #[test]
    fn same_id_different_type_is_not_a_conflict() {
        let elements = vec![
            Element::new("id", "A", ElementType::String),
            Element::new("other", "B", ElementType::Number),
        ];
        assert!(element_conflict(
            &elements,
            None,
            "id",
            ElementType::String
        ));
        assert!(!element_conflict(
            &elements,
            None,
            "id",
            ElementType::Number
        ));
    }

    #[test]
    fn update_excludes_own_identity() {
        let elements = vec![
            Element::new("id", "A", ElementType::String),
            Element::new("id", "B", ElementType::Number),
        ];
        let own = elements[1].uid.clone();
        // Keeping its own (id, type) is fine.
        assert!(!element_conflict(
            &elements,
            Some(&own),
            "id",
            ElementType::Number
        ));
        // Moving onto the sibling's pair is not.
        assert!(element_conflict(
            &elements,
            Some(&own),
            "id",
            ElementType::String
        ));
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
    fn option_values_collide_within_one_element() {
        let options = vec![str_option("111"), str_option("100")];
        let colliding = OptionValue::String {
            value: "111".into(),
        };
        assert!(option_conflict(&options, Some(1), &colliding));
        assert!(!option_conflict(&options, Some(0), &colliding));
    }

    #[test]
    fn option_exclusion_is_positional_across_shared_ids() {
        // A string "123" and a number 123 both derive id "123"; excluding by
        // position must still see the sibling's value.
        let options = vec![
            str_option("123"),
            ElementOption {
                id: "123".into(),
                label: "label".into(),
                value: OptionValue::Number { value: 123.0 },
                icon: None,
            },
        ];
        let onto_string = OptionValue::String {
            value: "123".into(),
        };
        assert!(option_conflict(&options, Some(1), &onto_string));
        assert!(!option_conflict(&options, Some(0), &onto_string));
    }
}
