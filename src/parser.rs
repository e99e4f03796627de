use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::normalize::FieldMapping;

/// Path, query or header values as written in the suite. Scalars of any type
/// are accepted and turned into strings when the request is built.
pub type Params = IndexMap<String, Value>;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    #[serde(default)]
    pub ignore_case: bool,
    /// Lowercase string values of both responses as well, not only keys
    #[serde(default)]
    pub ignore_value_case: bool,
    pub base_a: Endpoint,
    pub base_b: Endpoint,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    #[serde(default)]
    pub headers: Params,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    pub name: String,
    pub method: String,
    pub api_a: ApiSpec,
    pub api_b: ApiSpec,
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSpec {
    pub path: String,
    pub headers: Option<Params>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub api_a: Option<CaseRequest>,
    pub api_b: Option<CaseRequest>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaseRequest {
    pub path_params: Option<Params>,
    pub query_params: Option<Params>,
    pub headers: Option<Params>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

impl Format {
    /// `.toml` files are read as TOML, everything else as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Yaml,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Toml => write!(f, "toml"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("Failed to parse {format} file: {message}")]
pub struct ParseError {
    format: Format,
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: Option<SourceSpan>,
}

impl TestSuite {
    pub fn parse(contents: &str, format: Format, file_name: &str) -> Result<Self, ParseError> {
        let error = |message: String, span: Option<SourceSpan>| ParseError {
            format,
            message,
            src: NamedSource::new(file_name, contents.to_string()),
            span,
        };

        match format {
            Format::Yaml => serde_yaml::from_str(contents).map_err(|e| {
                let span = e
                    .location()
                    .map(|location| SourceSpan::new(location.index().into(), 1));
                error(e.to_string(), span)
            }),
            Format::Toml => toml::from_str(contents).map_err(|e| {
                let span = e
                    .span()
                    .map(|range| SourceSpan::new(range.start.into(), range.len()));
                error(e.message().to_string(), span)
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use serde_json::json;

    use super::*;

    const YAML: &str = r#"
ignoreCase: true
baseA:
  url: http://legacy.local
  headers:
    Authorization: Bearer a
baseB:
  url: http://next.local
tests:
  - name: get user
    method: get
    apiA:
      path: /users/:id
    apiB:
      path: /v2/users/:id
      headers:
        X-Version: 2
    ignoreFields: [updated_at]
    fieldMappings:
      - path: ""
        mappings:
          user_id: id
      - path: profile
        subtree: true
        mappings:
          nick: nickname
    cases:
      - name: user 1
        apiA:
          pathParams: { id: 1 }
          queryParams: { verbose: true }
        apiB:
          pathParams: { id: "1" }
"#;

    const TOML: &str = r#"
[baseA]
url = "http://legacy.local"

[baseB]
url = "http://next.local"

[[tests]]
name = "list"
method = "GET"
apiA = { path = "/items" }
apiB = { path = "/v2/items" }

[[tests.cases]]
name = "first page"
apiA = { queryParams = { page = 1 } }
"#;

    #[test]
    fn parses_yaml_suite() {
        let suite = TestSuite::parse(YAML, Format::Yaml, "suite.yaml").unwrap();

        assert!(suite.ignore_case);
        assert!(!suite.ignore_value_case);
        assert_eq!(suite.base_a.headers["Authorization"], json!("Bearer a"));
        assert!(suite.base_b.headers.is_empty());

        let test = &suite.tests[0];
        assert_eq!(test.method, "get");
        assert_eq!(test.ignore_fields, vec!["updated_at"]);
        assert_eq!(test.field_mappings.len(), 2);
        assert_eq!(test.field_mappings[0].path, "");
        assert!(test.field_mappings[1].subtree);
        assert_eq!(test.api_b.headers.as_ref().unwrap()["X-Version"], json!(2));

        let case = &test.cases[0];
        let api_a = case.api_a.as_ref().unwrap();
        assert_eq!(api_a.path_params.as_ref().unwrap()["id"], json!(1));
        assert_eq!(api_a.query_params.as_ref().unwrap()["verbose"], json!(true));
        assert!(case.api_b.as_ref().unwrap().query_params.is_none());
    }

    #[test]
    fn parses_toml_suite() {
        let suite = TestSuite::parse(TOML, Format::Toml, "suite.toml").unwrap();

        assert!(!suite.ignore_case);
        assert_eq!(suite.tests[0].cases[0].name, "first page");
        assert!(suite.tests[0].cases[0].api_b.is_none());
        assert!(suite.tests[0].field_mappings.is_empty());
    }

    #[test]
    fn missing_base_is_a_parse_error() {
        let err = TestSuite::parse("tests: []\n", Format::Yaml, "bad.yaml").unwrap_err();

        assert!(err.to_string().contains("baseA"));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("a/suite.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("suite.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("suite")), Format::Yaml);
    }
}
