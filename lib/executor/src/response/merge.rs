use serde_json::Value;
use tracing::instrument;

use crate::response::path::{PathSegment, ResponsePath};

/// Two writes disagreed about the value stored at `path`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Conflicting writes at \"{path}\": {reason}")]
pub struct MergeConflict {
    pub path: ResponsePath,
    pub reason: String,
}

/// Deeply merges `source` into `target`, where `target` lives at `at`.
///
/// Merging only adds data: a `null` source is ignored, a `null` target is
/// filled, equal scalars are accepted and anything else that would replace an
/// existing value is reported as a [`MergeConflict`].
#[instrument(level = "trace", skip(target, source), fields(path = %at))]
pub fn deep_merge(target: &mut Value, source: Value, at: &ResponsePath) -> Result<(), MergeConflict> {
    let mut path = at.segments().to_vec();
    deep_merge_internal(target, source, &mut path)
}

fn deep_merge_internal(
    target: &mut Value,
    source: Value,
    path: &mut Vec<PathSegment>,
) -> Result<(), MergeConflict> {
    if source.is_null() {
        return Ok(());
    }

    if target.is_null() {
        *target = source;
        return Ok(());
    }

    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => {
                        path.push(PathSegment::Field(key));
                        deep_merge_internal(target_value, source_value, path)?;
                        path.pop();
                    }
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
            Ok(())
        }
        (Value::Array(target_arr), Value::Array(source_arr)) => {
            if target_arr.len() != source_arr.len() {
                return Err(conflict(
                    path,
                    format!(
                        "list of length {} cannot be merged with list of length {}",
                        target_arr.len(),
                        source_arr.len()
                    ),
                ));
            }
            for (index, (target_value, source_value)) in
                target_arr.iter_mut().zip(source_arr).enumerate()
            {
                path.push(PathSegment::Index(index));
                deep_merge_internal(target_value, source_value, path)?;
                path.pop();
            }
            Ok(())
        }
        (target, source) => {
            if *target == source {
                return Ok(());
            }
            Err(conflict(
                path,
                format!(
                    "existing {} {} differs from incoming {} {}",
                    kind_of(target),
                    target,
                    kind_of(&source),
                    source
                ),
            ))
        }
    }
}

pub(crate) fn conflict(path: &[PathSegment], reason: String) -> MergeConflict {
    MergeConflict {
        path: path.to_vec().into(),
        reason,
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
