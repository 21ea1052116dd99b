use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{instrument, trace};

use crate::{
    plan::{FlattenNodePath, PlanPosition, SelectionItem, SelectionSet},
    response::{
        graphql_error::GraphQLError,
        merge::{conflict, deep_merge, kind_of, MergeConflict},
        path::{PathSegment, ResponsePath},
    },
    utils::{consts::TYPENAME_FIELD_NAME, traverse::traverse_and_callback},
};

/// The key fields of one entity found in the response, and where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub position: ResponsePath,
    pub typename: Option<String>,
    pub keys: Value,
}

/// The response document being assembled by one plan execution,
/// together with the errors collected along the way.
///
/// All access goes through path-addressed operations; locks are never held
/// across a suspension point. Errors are tagged with the position of the plan
/// node that raised them and come out in plan order, whatever order the
/// fetches completed in.
#[derive(Debug, Default)]
pub struct ResponseTree {
    data: Mutex<Value>,
    errors: Mutex<Vec<(PlanPosition, GraphQLError)>>,
}

impl ResponseTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn errors(&self) -> MutexGuard<'_, Vec<(PlanPosition, GraphQLError)>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merges `value` at a concrete `path`, creating the objects and lists
    /// leading to it when they do not exist yet.
    #[instrument(level = "trace", skip(self, value), fields(path = %path))]
    pub fn merge_at(&self, path: &ResponsePath, value: Value) -> Result<(), MergeConflict> {
        let mut data = self.data();
        let target = value_at_mut(&mut data, path)?;
        deep_merge(target, value, path)
    }

    /// Applies a batch of writes under a single lock, in the given order.
    pub fn merge_all<I>(&self, writes: I) -> Result<(), MergeConflict>
    where
        I: IntoIterator<Item = (ResponsePath, Value)>,
    {
        let mut data = self.data();
        for (path, value) in writes {
            let target = value_at_mut(&mut data, &path)?;
            deep_merge(target, value, &path)?;
        }
        Ok(())
    }

    /// Records an error raised by the node at `position`, keeping the data
    /// merged so far untouched.
    pub fn attach_error(&self, position: &PlanPosition, path: &ResponsePath, error: GraphQLError) {
        trace!(node = %position, path = %path, message = %error.message, "attaching error");
        self.errors().push((position.clone(), error.with_path(path)));
    }

    /// Records errors whose paths were already resolved by the caller.
    pub fn extend_errors(
        &self,
        position: &PlanPosition,
        errors: impl IntoIterator<Item = GraphQLError>,
    ) {
        self.errors()
            .extend(errors.into_iter().map(|error| (position.clone(), error)));
    }

    /// Concrete locations of every non-null value reached by `path`, in
    /// document order.
    pub fn positions_at(&self, path: &FlattenNodePath) -> Vec<ResponsePath> {
        let data = self.data();
        let mut positions = Vec::new();
        traverse_and_callback(&data, path.as_slice(), ResponsePath::root(), &mut |at, _| {
            positions.push(at)
        });
        positions
    }

    /// For every object reached by `path`, in document order, returns its
    /// typename and the fields selected by `key_selections`.
    #[instrument(level = "trace", skip(self, key_selections), fields(path = %path))]
    pub fn snapshot_keys_at(
        &self,
        path: &FlattenNodePath,
        key_selections: &SelectionSet,
    ) -> Vec<EntitySnapshot> {
        let data = self.data();
        let mut snapshots = Vec::new();
        traverse_and_callback(&data, path.as_slice(), ResponsePath::root(), &mut |at, entity| {
            if let Value::Object(object) = entity {
                let typename = object
                    .get(TYPENAME_FIELD_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let mut keys = Map::new();
                project_into(object, typename.as_deref(), key_selections, &mut keys);
                snapshots.push(EntitySnapshot {
                    position: at,
                    typename,
                    keys: Value::Object(keys),
                });
            }
        });
        snapshots
    }

    /// The final data, and the errors in plan order. Errors of one node keep
    /// the order they were recorded in.
    pub fn into_parts(self) -> (Value, Vec<GraphQLError>) {
        let data = self.data.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut errors = self.errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        errors.sort_by(|(a, _), (b, _)| a.cmp(b));
        (data, errors.into_iter().map(|(_, error)| error).collect())
    }
}

fn value_at_mut<'a>(
    root: &'a mut Value,
    path: &ResponsePath,
) -> Result<&'a mut Value, MergeConflict> {
    let segments = path.segments();
    let mut current = root;
    for (depth, segment) in segments.iter().enumerate() {
        current = match segment {
            PathSegment::Field(name) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => map.entry(name.as_str()).or_insert(Value::Null),
                    other => {
                        return Err(conflict(
                            &segments[..depth],
                            format!("expected an object, found {}", kind_of(other)),
                        ))
                    }
                }
            }
            PathSegment::Index(index) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                match current {
                    Value::Array(items) => {
                        if items.len() <= *index {
                            items.resize(*index + 1, Value::Null);
                        }
                        &mut items[*index]
                    }
                    other => {
                        return Err(conflict(
                            &segments[..depth],
                            format!("expected a list, found {}", kind_of(other)),
                        ))
                    }
                }
            }
        };
    }
    Ok(current)
}

fn project(value: &Value, selections: &SelectionSet) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project(item, selections))
                .collect(),
        ),
        Value::Object(object) => {
            let typename = object.get(TYPENAME_FIELD_NAME).and_then(Value::as_str);
            let mut projected = Map::new();
            project_into(object, typename, selections, &mut projected);
            Value::Object(projected)
        }
        other => other.clone(),
    }
}

fn project_into(
    object: &Map<String, Value>,
    typename: Option<&str>,
    selections: &SelectionSet,
    projected: &mut Map<String, Value>,
) {
    for item in &selections.items {
        match item {
            SelectionItem::Field(field) => {
                let key = field.response_key();
                if let Some(value) = object.get(key) {
                    let value = if field.selections.is_empty() {
                        value.clone()
                    } else {
                        project(value, &field.selections)
                    };
                    projected.insert(key.to_string(), value);
                }
            }
            SelectionItem::InlineFragment(fragment) => {
                let applies = match (&fragment.type_condition, typename) {
                    (Some(type_condition), Some(typename)) => type_condition == typename,
                    _ => true,
                };
                if applies {
                    project_into(object, typename, &fragment.selections, projected);
                }
            }
        }
    }
}
