/// Move the item at `from` so that it ends up at `to`, keeping the relative
/// order of everything else. A missing destination (drop outside any valid
/// target) leaves the sequence untouched. Unmoved items keep their identity,
/// so anything tracked by a stable key stays valid across the move.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: Option<usize>) {
    let Some(to) = to else {
        return;
    };
    if from >= items.len() {
        return;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_item_towards_front() {
        let mut items = vec!["a", "b"];
        move_item(&mut items, 1, Some(0));
        assert_eq!(items, vec!["b", "a"]);
    }

    #[test]
    fn missing_destination_is_a_noop() {
        let mut items = vec!["a", "b"];
        move_item(&mut items, 1, None);
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn preserves_relative_order_of_others() {
        let mut items = vec![1, 2, 3, 4, 5];
        move_item(&mut items, 0, Some(3));
        assert_eq!(items, vec![2, 3, 4, 1, 5]);
    }

    #[test]
    fn out_of_range_source_is_ignored() {
        let mut items = vec![1, 2];
        move_item(&mut items, 5, Some(0));
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn destination_past_end_clamps() {
        let mut items = vec![1, 2, 3];
        move_item(&mut items, 0, Some(10));
        assert_eq!(items, vec![2, 3, 1]);
    }
}
