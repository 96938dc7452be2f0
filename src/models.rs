// src/models.rs

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type};
use serde::{Deserialize, Serialize};

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------
// Using newtype pattern for type safety to prevent mixing project IDs with
// other integers flowing through the pipeline

/// Strongly typed identifier for the projects being scored
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for ProjectId {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        // Delegate to the implementation for i64
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql_checked(ty, out)
    }
}

impl<'a> FromSql<'a> for ProjectId {
    fn from_sql(ty: &Type, raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let id = i64::from_sql(ty, raw)?;
        Ok(ProjectId(id))
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}

//------------------------------------------------------------------------------
// ATTRIBUTE VALUES
//------------------------------------------------------------------------------

/// A single computed attribute value.
///
/// `Null` round-trips as SQL NULL, so a partial computation can leave a
/// declared column untouched without inventing a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Whether a persisted value counts as real data. A project that was
    /// inactive when an earlier run wrote its row keeps NULL (or zero) in
    /// every attribute column, and such a row must not win a merge.
    pub fn is_meaningful(&self) -> bool {
        match self {
            AttributeValue::Integer(v) => *v != 0,
            AttributeValue::Float(v) => *v != 0.0,
            AttributeValue::Text(v) => !v.is_empty(),
            AttributeValue::Bool(v) => *v,
            AttributeValue::Null => false,
        }
    }

    /// Numeric view used by scoring; text has no numeric reading.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            AttributeValue::Text(_) | AttributeValue::Null => None,
        }
    }
}

impl ToSql for AttributeValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            AttributeValue::Integer(v) => v.to_sql(ty, out),
            AttributeValue::Float(v) => v.to_sql(ty, out),
            AttributeValue::Text(v) => v.to_sql(ty, out),
            AttributeValue::Bool(v) => v.to_sql(ty, out),
            AttributeValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <bool as ToSql>::accepts(ty)
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            AttributeValue::Integer(v) => v.to_sql_checked(ty, out),
            AttributeValue::Float(v) => v.to_sql_checked(ty, out),
            AttributeValue::Text(v) => v.to_sql_checked(ty, out),
            AttributeValue::Bool(v) => v.to_sql_checked(ty, out),
            AttributeValue::Null => Ok(IsNull::Yes),
        }
    }
}

impl<'a> FromSql<'a> for AttributeValue {
    fn from_sql(ty: &Type, raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if *ty == Type::INT2 {
            Ok(AttributeValue::Integer(i16::from_sql(ty, raw)? as i64))
        } else if *ty == Type::INT4 {
            Ok(AttributeValue::Integer(i32::from_sql(ty, raw)? as i64))
        } else if *ty == Type::INT8 {
            Ok(AttributeValue::Integer(i64::from_sql(ty, raw)?))
        } else if *ty == Type::FLOAT4 {
            Ok(AttributeValue::Float(f32::from_sql(ty, raw)? as f64))
        } else if *ty == Type::FLOAT8 {
            Ok(AttributeValue::Float(f64::from_sql(ty, raw)?))
        } else if *ty == Type::BOOL {
            Ok(AttributeValue::Bool(bool::from_sql(ty, raw)?))
        } else if <String as FromSql>::accepts(ty) {
            Ok(AttributeValue::Text(String::from_sql(ty, raw)?))
        } else {
            Err(format!("attribute value does not support column type {}", ty).into())
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(AttributeValue::Null)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INT2
            || *ty == Type::INT4
            || *ty == Type::INT8
            || *ty == Type::FLOAT4
            || *ty == Type::FLOAT8
            || *ty == Type::BOOL
            || <String as FromSql>::accepts(ty)
    }
}

//------------------------------------------------------------------------------
// ATTRIBUTE SETS
//------------------------------------------------------------------------------

/// Declares one attribute: its column name and whether computed values are
/// written back to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub persist: bool,
}

/// The mapping produced by one computation pass for one project. May be
/// partial; a present key may still map to `Null`.
pub type RawResults = HashMap<String, AttributeValue>;

/// Overlays `fresh` on `existing`: the result holds the union of both key
/// sets, and fresh values win on collision.
pub fn merge(existing: RawResults, fresh: &RawResults) -> RawResults {
    let mut merged = existing;
    for (name, value) in fresh {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
