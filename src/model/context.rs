use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user behind a request, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
        }
    }
}

/// Request-scoped information handed to authorizers, validators and hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub user: Option<UserContext>,
    pub headers: Vec<(String, String)>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: UserContext) -> Self {
        Self {
            user: Some(user),
            headers: Vec::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Query parameters (`include`, `fields`, `filter`, `sort`, `page`, ...).
///
/// They are carried through the pipeline unparsed; interpreting them is up
/// to validators and the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(pub Map<String, Value>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn filter(&self) -> Option<&Map<String, Value>> {
        self.0.get("filter").and_then(Value::as_object)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for QueryParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext {
            user: None,
            headers: vec![("Accept".into(), "application/vnd.api+json".into())],
        };
        assert_eq!(ctx.header("accept"), Some("application/vnd.api+json"));
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_query_filter() {
        let query: QueryParams =
            serde_json::from_value(json!({"filter": {"slug": "hello"}})).unwrap();
        assert_eq!(query.filter().unwrap()["slug"], json!("hello"));
        assert!(QueryParams::new().filter().is_none());
    }
}
