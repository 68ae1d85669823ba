//! Todo API endpoints.
//!
//! Each endpoint is a module holding its input/params/output types, its URL
//! template and a constructor binding a [`QueryHook`] to a transport.
//! Nothing here has behavior of its own; it is configuration for
//! [`create_query_hook`].

use serde::{Deserialize, Serialize};

use crate::hook::{create_query_hook, json_request, HookConfig, QueryHook, UrlSource};
use crate::transport::HttpTransport;

/// A todo item as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub completed: bool,
    /// Only present on verbose detail responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `GET /todos`, paged.
pub mod list {
    use super::*;

    pub const URL: &str = "/todos";

    pub type Input = ();
    pub type Output = Vec<Todo>;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Params {
        pub page: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub per_page: Option<u32>,
    }

    impl Params {
        pub fn page(page: u32) -> Self {
            Self { page, per_page: None }
        }
    }

    pub fn hook(transport: HttpTransport) -> QueryHook<Input, Params, Output> {
        create_query_hook(HookConfig::new(URL, json_request(transport)))
    }
}

/// `GET /todos/{slug}`, verbose by default.
pub mod detail {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Input {
        pub slug: String,
    }

    impl Input {
        pub fn new(slug: impl Into<String>) -> Self {
            Self { slug: slug.into() }
        }
    }

    pub type Output = Todo;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Params {
        pub verbose: bool,
    }

    pub fn url(input: &Input) -> String {
        format!("/todos/{}", input.slug)
    }

    pub fn hook(transport: HttpTransport) -> QueryHook<Input, Params, Output> {
        create_query_hook(
            HookConfig::new(UrlSource::resolver(url), json_request(transport))
                .default_params(Params { verbose: true }),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::hook::CallConfig;

    fn transport() -> HttpTransport {
        HttpTransport::new("http://localhost:3000")
    }

    #[test]
    fn list_key_uses_call_params() {
        let hook = list::hook(transport());
        let prepared = hook
            .prepare(&CallConfig::new(()).params(list::Params::page(2)))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&prepared.cache_key).unwrap(),
            json!(["GET", "/todos", {"page": 2}])
        );
    }

    #[test]
    fn list_without_params_has_null_params() {
        let prepared = list::hook(transport()).prepare(&CallConfig::new(())).unwrap();
        assert_eq!(
            serde_json::to_value(&prepared.cache_key).unwrap(),
            json!(["GET", "/todos", null])
        );
    }

    #[test]
    fn detail_key_uses_default_params() {
        let hook = detail::hook(transport());
        let prepared = hook.prepare(&CallConfig::new(detail::Input::new("x"))).unwrap();
        assert_eq!(
            serde_json::to_value(&prepared.cache_key).unwrap(),
            json!(["GET", "/todos/x", {"verbose": true}])
        );
    }

    #[test]
    fn detail_call_params_replace_defaults() {
        let hook = detail::hook(transport());
        let call = CallConfig::new(detail::Input::new("x")).params(detail::Params { verbose: false });
        assert_eq!(hook.prepare(&call).unwrap().params, Some(detail::Params { verbose: false }));
    }

    #[test]
    fn todo_parses_without_description() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":"00000000-0000-0000-0000-000000000001","slug":"a","title":"A","completed":false}"#,
        )
        .unwrap();
        assert!(todo.description.is_none());
    }
}
