use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

use crate::{
    plan::{FlattenNodePath, SelectionSet},
    response::{
        path::ResponsePath,
        tree::{EntitySnapshot, ResponseTree},
    },
    utils::consts::TYPENAME_FIELD_NAME,
};

/// The representations an entity fetch sends, in request order, and for
/// each of them the response positions it resolves.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityRepresentations {
    pub representations: Vec<Value>,
    pub positions: Vec<Vec<ResponsePath>>,
}

impl EntityRepresentations {
    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    /// Pairs each returned entity with every position it belongs to.
    pub fn into_writes(self, entities: Vec<Value>) -> Vec<(ResponsePath, Value)> {
        let mut writes = Vec::with_capacity(self.positions.iter().map(Vec::len).sum());
        for (positions, entity) in self.positions.into_iter().zip(entities) {
            let Some((last, rest)) = positions.split_last() else {
                continue;
            };
            for position in rest {
                writes.push((position.clone(), entity.clone()));
            }
            writes.push((last.clone(), entity));
        }
        writes
    }
}

/// Builds the representations for the entities found at `path`.
///
/// The order of the response is preserved: the first representation belongs
/// to the first entity reached at `path`. With `dedupe`, entities that
/// project to the same representation share one entry.
pub fn build_representations(
    tree: &ResponseTree,
    path: &FlattenNodePath,
    requires: &SelectionSet,
    dedupe: bool,
) -> EntityRepresentations {
    from_snapshots(tree.snapshot_keys_at(path, requires), dedupe)
}

fn from_snapshots(snapshots: Vec<EntitySnapshot>, dedupe: bool) -> EntityRepresentations {
    let mut result = EntityRepresentations::default();
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::new();

    for snapshot in snapshots {
        let Some(representation) = to_representation(snapshot.keys, snapshot.typename) else {
            trace!(position = %snapshot.position, "entity has no key fields, skipping");
            continue;
        };

        if !dedupe {
            result.representations.push(representation);
            result.positions.push(vec![snapshot.position]);
            continue;
        }

        let hash = fingerprint(&representation);
        let candidates = seen.entry(hash).or_default();
        match candidates
            .iter()
            .find(|index| result.representations[**index] == representation)
        {
            Some(index) => result.positions[*index].push(snapshot.position),
            None => {
                candidates.push(result.representations.len());
                result.representations.push(representation);
                result.positions.push(vec![snapshot.position]);
            }
        }
    }

    result
}

/// `None` when the entity carries nothing a service could resolve it by.
fn to_representation(keys: Value, typename: Option<String>) -> Option<Value> {
    let Value::Object(mut keys) = keys else {
        return None;
    };
    if keys.keys().all(|key| key == TYPENAME_FIELD_NAME) {
        return None;
    }
    if let Some(typename) = typename {
        keys.entry(TYPENAME_FIELD_NAME)
            .or_insert(Value::String(typename));
    }
    Some(Value::Object(keys))
}

fn fingerprint(value: &Value) -> u64 {
    let mut hasher = Xxh3::new();
    hash_value(value, &mut hasher);
    hasher.digest()
}

fn hash_value(value: &Value, hasher: &mut Xxh3) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(value) => hasher.update(if *value { b"t" } else { b"f" }),
        Value::Number(number) => {
            hasher.update(b"#");
            hasher.update(number.to_string().as_bytes());
        }
        Value::String(string) => {
            hasher.update(b"\"");
            hasher.update(string.as_bytes());
            hasher.update(b"\"");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_value(item, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        Value::Object(object) => {
            hasher.update(b"{");
            for (key, value) in object {
                hasher.update(key.as_bytes());
                hasher.update(b":");
                hash_value(value, hasher);
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
    }
}
