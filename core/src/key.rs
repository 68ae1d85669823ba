//! Cache keys derived from method, resolved URL and effective params.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Identity of a query in the [`QueryClient`](crate::QueryClient) store.
///
/// Always the ordered triple `(method, url, params)`. Params are kept as a
/// JSON value so keys from endpoints with different param types can share a
/// store; `None` stands for "no params" and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    method: HttpMethod,
    url: String,
    params: Option<Value>,
}

impl CacheKey {
    pub fn new<P: Serialize>(
        method: HttpMethod,
        url: impl Into<String>,
        params: Option<&P>,
    ) -> Result<Self, ApiError> {
        let params = params
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(Self {
            method,
            url: url.into(),
            params,
        })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }
}

// `Value` has no `Hash`; object keys are hashed in sorted order so the
// result agrees with `Value`'s order-insensitive map equality.
impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.url.hash(state);
        match &self.params {
            Some(value) => {
                1u8.hash(state);
                hash_value(value, state);
            }
            None => 0u8.hash(state),
        }
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (k, v) in entries {
                k.hash(state);
                hash_value(v, state);
            }
        }
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(self.method.as_str())?;
        tuple.serialize_element(&self.url)?;
        tuple.serialize_element(&self.params)?;
        tuple.end()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params.as_ref().unwrap_or(&Value::Null);
        write!(f, "[\"{}\",{},{}]", self.method, Value::from(self.url.as_str()), params)
    }
}
