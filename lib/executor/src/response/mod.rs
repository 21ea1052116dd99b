pub mod error_normalization;
pub mod graphql_error;
pub mod merge;
pub mod path;
pub mod result;
pub mod tree;
