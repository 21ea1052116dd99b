use serde_json::Value;

use crate::{
    plan::{FlattenNodePath, FlattenNodePathSegment},
    response::{
        graphql_error::{GraphQLError, CODE_EXTENSION, SERVICE_NAME_EXTENSION},
        path::{PathSegment, ResponsePath},
    },
    utils::consts::ENTITIES_FIELD_NAME,
};

pub const DOWNSTREAM_SERVICE_ERROR: &str = "DOWNSTREAM_SERVICE_ERROR";

/// Rewrites the errors a service returned so their paths point into the
/// client response.
///
/// An error located at `[_entities, i, ...rest]` is copied onto every response
/// position representation `i` was built from, e.g. with the fetch path
/// `topReviews.@.author`, `[_entities, 1, name]` becomes
/// `[topReviews, 3, author, name]` when representation 1 came from review 3.
/// Any other error is attached to the fetch path, cut at its first list
/// boundary.
pub fn normalize_service_errors(
    service_name: &str,
    fetch_path: &FlattenNodePath,
    entity_positions: &[Vec<ResponsePath>],
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    let mut normalized = Vec::with_capacity(errors.len());

    for error in errors {
        if let Some(positions) = entity_positions_of(&error, entity_positions) {
            let rest = error
                .path
                .as_ref()
                .map(|path| path.segments()[2..].to_vec())
                .unwrap_or_default();
            for position in positions {
                let mut real_path = position.clone();
                real_path.extend_from_slice(&rest);
                let mut error = error.clone();
                error.path = (!real_path.is_root()).then_some(real_path);
                normalized.push(add_service_info_to_error(error, service_name));
            }
            continue;
        }

        let mut real_path = unlocated_path(fetch_path);
        let mut error = error;
        if !fetch_path.has_list() {
            if let Some(path) = error.path.take() {
                real_path.extend_from_slice(path.segments());
            }
        }
        error.path = (!real_path.is_root()).then_some(real_path);
        normalized.push(add_service_info_to_error(error, service_name));
    }

    normalized
}

fn entity_positions_of<'a>(
    error: &GraphQLError,
    entity_positions: &'a [Vec<ResponsePath>],
) -> Option<&'a Vec<ResponsePath>> {
    let segments = error.path.as_ref()?.segments();
    match segments {
        [PathSegment::Field(first), PathSegment::Index(index), ..]
            if first == ENTITIES_FIELD_NAME =>
        {
            entity_positions.get(*index)
        }
        _ => None,
    }
}

/// The fields of `fetch_path` before its first list boundary, where errors
/// that cannot be tied to a single entity are reported.
pub fn unlocated_path(fetch_path: &FlattenNodePath) -> ResponsePath {
    let mut path = ResponsePath::root();
    for segment in fetch_path.as_slice() {
        match segment {
            FlattenNodePathSegment::Field(field_name) => {
                path = path.concat_field(field_name.as_str());
            }
            FlattenNodePathSegment::List => break,
            FlattenNodePathSegment::Cast(_) => continue,
        }
    }
    path
}

pub fn add_service_info_to_error(error: GraphQLError, service_name: &str) -> GraphQLError {
    error
        .with_default_extension(SERVICE_NAME_EXTENSION, Value::from(service_name))
        .with_default_extension(CODE_EXTENSION, Value::from(DOWNSTREAM_SERVICE_ERROR))
}
