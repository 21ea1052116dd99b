use serde_json::Value;
use tracing::warn;

use crate::{
    plan::FlattenNodePathSegment,
    response::path::ResponsePath,
    utils::consts::TYPENAME_FIELD_NAME,
};

/// Walks `current_data` along a flatten path and calls `callback` with every
/// object reached, together with its concrete location.
///
/// Lists are entered element by element, in order. When the path ends on a
/// list, each element is visited. `null` values are never visited.
pub fn traverse_and_callback<'a, Callback>(
    current_data: &'a Value,
    remaining_path: &[FlattenNodePathSegment],
    current_path: ResponsePath,
    callback: &mut Callback,
) where
    Callback: FnMut(ResponsePath, &'a Value),
{
    if current_data.is_null() {
        return;
    }

    if remaining_path.is_empty() {
        match current_data {
            Value::Array(arr) => {
                for (index, item) in arr.iter().enumerate() {
                    traverse_and_callback(item, remaining_path, current_path.concat_index(index), callback);
                }
            }
            _ => callback(current_path, current_data),
        }
        return;
    }

    match &remaining_path[0] {
        FlattenNodePathSegment::List => {
            if let Value::Array(arr) = current_data {
                let rest_of_path = &remaining_path[1..];
                for (index, item) in arr.iter().enumerate() {
                    traverse_and_callback(item, rest_of_path, current_path.concat_index(index), callback);
                }
            } else {
                warn!(
                    "Expected a list at \"{}\" while flattening, found a non-list value",
                    current_path
                );
            }
        }
        FlattenNodePathSegment::Field(field_name) => match current_data {
            Value::Object(map) => {
                if let Some(next_data) = map.get(field_name) {
                    traverse_and_callback(
                        next_data,
                        &remaining_path[1..],
                        current_path.concat_field(field_name.as_str()),
                        callback,
                    );
                }
            }
            // A field step applies to every item of a list the plan did not mark with "@".
            Value::Array(arr) => {
                for (index, item) in arr.iter().enumerate() {
                    traverse_and_callback(item, remaining_path, current_path.concat_index(index), callback);
                }
            }
            _ => {}
        },
        FlattenNodePathSegment::Cast(type_condition) => {
            if let Value::Object(obj) = current_data {
                let type_name = obj
                    .get(TYPENAME_FIELD_NAME)
                    .and_then(Value::as_str)
                    .unwrap_or(type_condition);
                if type_name == type_condition {
                    traverse_and_callback(current_data, &remaining_path[1..], current_path, callback);
                }
            }
        }
    }
}
