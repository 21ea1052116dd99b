use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub const LIST_SEGMENT: &str = "@";
const CAST_PREFIX: &str = "|[";
const CAST_SUFFIX: &str = "]";

/// A step of a `Flatten` node path.
///
/// Serialized as a plain string: `"@"` is a list boundary, `"|[Type]"` narrows
/// to objects of `Type`, anything else is a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlattenNodePathSegment {
    Field(String),
    List,
    Cast(String),
}

impl FlattenNodePathSegment {
    fn parse(raw: &str) -> Self {
        if raw == LIST_SEGMENT {
            return FlattenNodePathSegment::List;
        }

        if let Some(type_condition) = raw
            .strip_prefix(CAST_PREFIX)
            .and_then(|rest| rest.strip_suffix(CAST_SUFFIX))
        {
            return FlattenNodePathSegment::Cast(type_condition.to_string());
        }

        FlattenNodePathSegment::Field(raw.to_string())
    }
}

impl Display for FlattenNodePathSegment {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            FlattenNodePathSegment::Field(name) => write!(f, "{}", name),
            FlattenNodePathSegment::List => write!(f, "{}", LIST_SEGMENT),
            FlattenNodePathSegment::Cast(type_condition) => {
                write!(f, "{}{}{}", CAST_PREFIX, type_condition, CAST_SUFFIX)
            }
        }
    }
}

impl Serialize for FlattenNodePathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FlattenNodePathSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SegmentVisitor;

        impl de::Visitor<'_> for SegmentVisitor {
            type Value = FlattenNodePathSegment;

            fn expecting(&self, formatter: &mut FmtFormatter) -> FmtResult {
                formatter.write_str("a field name, \"@\" or a \"|[Type]\" type condition")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(FlattenNodePathSegment::parse(value))
            }
        }

        deserializer.deserialize_str(SegmentVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlattenNodePath(Vec<FlattenNodePathSegment>);

impl FlattenNodePath {
    pub fn as_slice(&self) -> &[FlattenNodePathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_list(&self) -> bool {
        self.0
            .iter()
            .any(|segment| matches!(segment, FlattenNodePathSegment::List))
    }

    /// Path of the flatten node nested inside the current one.
    pub fn join(&self, other: &FlattenNodePath) -> FlattenNodePath {
        let mut segments = Vec::with_capacity(self.0.len() + other.0.len());
        segments.extend_from_slice(&self.0);
        segments.extend_from_slice(&other.0);
        FlattenNodePath(segments)
    }
}

impl From<&[&str]> for FlattenNodePath {
    fn from(raw: &[&str]) -> Self {
        FlattenNodePath(raw.iter().map(|s| FlattenNodePathSegment::parse(s)).collect())
    }
}

impl Display for FlattenNodePath {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
