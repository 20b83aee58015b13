use serde_json::{Map, Value};

/// Writes `value` at `segments` inside `root`, creating intermediate objects.
///
/// Later writes win. Returns the dotted path of whatever existing data was
/// overwritten (a previous leaf, or a non-object sitting where an
/// intermediate object is needed), so callers can report collisions.
pub fn merge_path(root: &mut Value, segments: &[String], value: Value) -> Option<String> {
    let Some((leaf, parents)) = segments.split_last() else {
        let clobbered = !root.is_null();
        *root = value;
        return clobbered.then(String::new);
    };

    let mut collision = None;
    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let (map, replaced) = ensure_object(current);
        if replaced && collision.is_none() {
            collision = Some(segments[..depth].join("."));
        }
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let (map, replaced) = ensure_object(current);
    if replaced && collision.is_none() {
        collision = Some(parents.join("."));
    }
    if map.insert(leaf.clone(), value).is_some() && collision.is_none() {
        collision = Some(segments.join("."));
    }
    collision
}

fn ensure_object(value: &mut Value) -> (&mut Map<String, Value>, bool) {
    let replaced = !value.is_object() && !value.is_null();
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => (map, replaced),
        _ => unreachable!("value was just replaced by an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn path(raw: &str) -> Vec<String> {
        raw.split('.').map(ToOwned::to_owned).collect()
    }

    #[test]
    fn creates_intermediate_objects() {
        let mut root = json!({});
        assert_eq!(merge_path(&mut root, &path("a.b.c"), json!(1)), None);
        assert_eq!(merge_path(&mut root, &path("a.d"), json!("x")), None);
        assert_eq!(root, json!({"a": {"b": {"c": 1}, "d": "x"}}));
    }

    #[test]
    fn later_write_wins_and_is_reported() {
        let mut root = json!({});
        merge_path(&mut root, &path("a.b"), json!(1));
        let collision = merge_path(&mut root, &path("a.b"), json!(2));
        assert_eq!(collision.as_deref(), Some("a.b"));
        assert_eq!(root, json!({"a": {"b": 2}}));
    }

    #[test]
    fn scalar_in_the_way_is_replaced() {
        let mut root = json!({});
        merge_path(&mut root, &path("a.b"), json!(1));
        let collision = merge_path(&mut root, &path("a.b.c"), json!(2));
        assert_eq!(collision.as_deref(), Some("a.b"));
        assert_eq!(root, json!({"a": {"b": {"c": 2}}}));
    }

    proptest! {
        #[test]
        fn merged_value_is_readable_at_its_path(
            segments in proptest::collection::vec("[a-z]{1,4}", 1..5),
            n in any::<i64>(),
        ) {
            let mut root = json!({});
            merge_path(&mut root, &segments, json!(n));
            let pointer = format!("/{}", segments.join("/"));
            prop_assert_eq!(root.pointer(&pointer), Some(&json!(n)));
        }
    }
}
