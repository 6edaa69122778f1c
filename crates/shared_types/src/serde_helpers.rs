use std::collections::HashMap;

use serde::Serialize;

// From a stackoverflow comment
pub fn ordered_map<S, K, V>(value: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    K: Serialize + std::hash::Hash + Eq + PartialOrd + Ord,
    V: Serialize,
{
    let ordered: std::collections::BTreeMap<_, _> = value.iter().collect();
    ordered.serialize(serializer)
}
