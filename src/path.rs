use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;
use url::form_urlencoded;

use crate::parser::Params;

/// Characters left untouched when a path parameter is encoded, the same set
/// `encodeURIComponent` keeps.
const PATH_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Substitutes every `:name` placeholder in `template` with the
/// percent-encoded value of `params[name]`.
///
/// Placeholders without a matching parameter are left in place, so the
/// resulting path can still contain `:name` tokens.
pub fn fill_path(template: &str, params: Option<&Params>) -> String {
    let Some(params) = params else {
        return template.to_string();
    };

    params.iter().fold(template.to_string(), |path, (key, value)| {
        let encoded = utf8_percent_encode(&param_to_string(value), PATH_COMPONENT).to_string();
        replace_token(&path, key, &encoded)
    })
}

/// Builds a `?`-prefixed query string, or an empty string when there is
/// nothing to append.
pub fn build_query(params: Option<&Params>) -> String {
    let Some(params) = params.filter(|params| !params.is_empty()) else {
        return String::new();
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, &param_to_string(value));
    }

    format!("?{}", serializer.finish())
}

/// String form of a parameter value as it ends up in a URL.
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => param_to_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn replace_token(path: &str, key: &str, replacement: &str) -> String {
    if key.is_empty() {
        return path.to_string();
    }

    let token = format!(":{key}");
    let mut filled = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(start) = rest.find(&token) {
        let (before, after) = rest.split_at(start);
        let after = &after[token.len()..];

        filled.push_str(before);
        // `:id` must not eat the front of `:idType`
        if after.chars().next().is_some_and(is_ident_char) {
            filled.push_str(&token);
        } else {
            filled.push_str(replacement);
        }

        rest = after;
    }

    filled.push_str(rest);
    filled
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn fill_path_without_params_returns_template() {
        assert_eq!(fill_path("/users/:id", None), "/users/:id");

        let unrelated = params(json!({ "other": "x" }));
        assert_eq!(fill_path("/users/:id", Some(&unrelated)), "/users/:id");
    }

    #[test]
    fn fill_path_resolves_and_encodes() {
        let p = params(json!({ "id": 42, "name": "john doe", "slug": "a/b?c" }));

        assert_eq!(
            fill_path("/users/:id/:name/:slug", Some(&p)),
            "/users/42/john%20doe/a%2Fb%3Fc"
        );
    }

    #[test]
    fn fill_path_keeps_unreserved_characters() {
        let p = params(json!({ "v": "a-b_c.d!e~f*g'h(i)" }));

        assert_eq!(fill_path("/:v", Some(&p)), "/a-b_c.d!e~f*g'h(i)");
    }

    #[test]
    fn fill_path_respects_token_boundaries() {
        let p = params(json!({ "id": "1" }));

        assert_eq!(
            fill_path("/items/:id/kinds/:idType", Some(&p)),
            "/items/1/kinds/:idType"
        );
    }

    #[test]
    fn fill_path_replaces_repeated_tokens() {
        let p = params(json!({ "id": "7" }));

        assert_eq!(fill_path("/a/:id/b/:id", Some(&p)), "/a/7/b/7");
    }

    #[test]
    fn build_query_empty_or_missing() {
        assert_eq!(build_query(None), "");
        assert_eq!(build_query(Some(&Params::new())), "");
    }

    #[test]
    fn build_query_keeps_declaration_order() {
        let p = params(json!({ "page": 2, "q": "hello world", "active": true }));

        assert_eq!(build_query(Some(&p)), "?page=2&q=hello+world&active=true");
    }

    #[test]
    fn param_to_string_coerces_like_a_string_cast() {
        assert_eq!(param_to_string(&json!(1.5)), "1.5");
        assert_eq!(param_to_string(&json!(null)), "null");
        assert_eq!(param_to_string(&json!([1, "a", null])), "1,a,");
    }
}
