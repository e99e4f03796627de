use std::str::FromStr;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::Method;
use reqwest::Url;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde_json::Value;
use thiserror::Error;

use crate::normalize::FieldMapping;
use crate::normalize::fold_key;
use crate::parser;
use crate::parser::Endpoint;
use crate::parser::Params;
use crate::parser::TestSuite;
use crate::path::param_to_string;

// Error messages for parsing URLs
const BASE_URL_ENDS_WITH: &str =
    "The base URL can't end with a /, and each api path in a test must start with one";
const PATH_MISSING_SLASH: &str = "The api path of a test is required to begin with a leading /.";

pub struct Validator {
    suite: TestSuite,
    src: String,
    file_name: String,
}

/// Everything the runner needs, checked up front so a run never stops
/// halfway because of a broken config.
#[derive(Debug)]
pub struct SuitePlan {
    pub ignore_case: bool,
    pub ignore_value_case: bool,
    pub tests: Vec<TestPlan>,
}

#[derive(Debug)]
pub struct TestPlan {
    pub name: String,
    pub method: Method,
    pub api_a: ApiPlan,
    pub api_b: ApiPlan,
    /// Already folded when the suite ignores case
    pub ignore_fields: Vec<String>,
    /// Already folded when the suite ignores case
    pub field_mappings: Vec<FieldMapping>,
    pub cases: Vec<CasePlan>,
}

#[derive(Debug)]
pub struct ApiPlan {
    pub base_url: String,
    pub path: String,
    /// Base headers overlaid with the api headers
    pub headers: HeaderMap,
}

#[derive(Debug)]
pub struct CasePlan {
    pub name: String,
    pub api_a: CaseParams,
    pub api_b: CaseParams,
}

#[derive(Debug, Default)]
pub struct CaseParams {
    pub path_params: Option<Params>,
    pub query_params: Option<Params>,
    pub headers: HeaderMap,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new($self.file_name.clone(), $self.src.clone())),
            span: find_span($snippet, &$self.src),
        }
    };
}

impl Validator {
    pub fn new(suite: &TestSuite, src: &str, file_name: &str) -> Self {
        Self {
            suite: suite.clone(),
            src: src.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> miette::Result<SuitePlan, ValidationError> {
        self.check_base_url("baseA.url", &self.suite.base_a.url)?;
        self.check_base_url("baseB.url", &self.suite.base_b.url)?;

        let tests = self
            .suite
            .tests
            .iter()
            .map(|test| self.create_test(test))
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(SuitePlan {
            ignore_case: self.suite.ignore_case,
            ignore_value_case: self.suite.ignore_value_case,
            tests,
        })
    }

    fn check_base_url(&self, field: &str, base_url: &str) -> Result<(), ValidationError> {
        if base_url.ends_with('/') {
            return Err(validation_err!(field, BASE_URL_ENDS_WITH, self, base_url));
        }

        Url::parse(base_url).map_err(|e| validation_err!(field, e, self, base_url))?;

        Ok(())
    }

    fn create_test(&self, test: &parser::TestSpec) -> Result<TestPlan, ValidationError> {
        let method = parse_method(&test.method.to_uppercase()).map_err(|e| {
            validation_err!(format!("{} - method", test.name), e, self, &test.method)
        })?;

        let api_a = self.create_api(&test.name, "apiA", &self.suite.base_a, &test.api_a)?;
        let api_b = self.create_api(&test.name, "apiB", &self.suite.base_b, &test.api_b)?;

        for mapping in &test.field_mappings {
            if !mapping.path.is_empty() && mapping.path.split('.').any(str::is_empty) {
                return Err(validation_err!(
                    format!("{} - fieldMappings", test.name),
                    format!("`{}` has an empty path segment", mapping.path),
                    self,
                    &mapping.path
                ));
            }
        }

        // Response keys get folded when the suite ignores case, so the
        // names that address them have to be folded the same way.
        let (ignore_fields, field_mappings) = if self.suite.ignore_case {
            (
                test.ignore_fields.iter().map(|field| fold_key(field)).collect(),
                test.field_mappings.iter().map(FieldMapping::folded).collect(),
            )
        } else {
            (test.ignore_fields.clone(), test.field_mappings.clone())
        };

        let cases = test
            .cases
            .iter()
            .map(|case| {
                Ok(CasePlan {
                    name: case.name.clone(),
                    api_a: self.create_case_params(case.api_a.as_ref())?,
                    api_b: self.create_case_params(case.api_b.as_ref())?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(TestPlan {
            name: test.name.clone(),
            method,
            api_a,
            api_b,
            ignore_fields,
            field_mappings,
            cases,
        })
    }

    fn create_api(
        &self,
        test_name: &str,
        side: &str,
        base: &Endpoint,
        api: &parser::ApiSpec,
    ) -> Result<ApiPlan, ValidationError> {
        if !api.path.starts_with('/') {
            return Err(validation_err!(
                format!("{test_name} - {side}.path"),
                PATH_MISSING_SLASH,
                self,
                &api.path
            ));
        }

        // Api headers take precedence over the base headers
        let mut headers = self.parse_header_map(&base.headers)?;
        if let Some(api_headers) = &api.headers {
            overlay(&mut headers, self.parse_header_map(api_headers)?);
        }

        Ok(ApiPlan {
            base_url: base.url.clone(),
            path: api.path.clone(),
            headers,
        })
    }

    fn create_case_params(
        &self,
        request: Option<&parser::CaseRequest>,
    ) -> Result<CaseParams, ValidationError> {
        let Some(request) = request else {
            return Ok(CaseParams::default());
        };

        let headers = match &request.headers {
            Some(headers) => self.parse_header_map(headers)?,
            None => HeaderMap::new(),
        };

        Ok(CaseParams {
            path_params: request.path_params.clone(),
            query_params: request.query_params.clone(),
            headers,
        })
    }

    fn parse_header_map(&self, headers: &Params) -> Result<HeaderMap, ValidationError> {
        let mut header_map = HeaderMap::new();

        for (k, v) in headers {
            let v_str = match v {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => param_to_string(v),
                _ => {
                    return Err(validation_err!(
                        k,
                        format!("Header value must be a string, got {v}"),
                        self,
                        k
                    ));
                }
            };

            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                validation_err!(k, format!("Invalid header name `{k}`: {e}"), self, k)
            })?;

            let value = HeaderValue::from_str(&v_str).map_err(|e| {
                validation_err!(
                    k,
                    format!("Invalid header value for `{k}`: {e}"),
                    self,
                    &v_str
                )
            })?;

            header_map.insert(name, value);
        }

        Ok(header_map)
    }
}

/// Inserts every header of `top` into `base`, replacing headers that share
/// a name.
pub fn overlay(base: &mut HeaderMap, top: HeaderMap) {
    let mut last_name = None;
    for (name, value) in top {
        // `None` means another value for the previous name
        match name {
            Some(name) => {
                base.insert(name.clone(), value);
                last_name = Some(name);
            }
            None => {
                if let Some(name) = &last_name {
                    base.append(name.clone(), value);
                }
            }
        }
    }
}

fn parse_method(method: &str) -> Result<reqwest::Method, String> {
    let method = Method::from_str(method).map_err(|e| e.to_string())?;

    if !matches!(
        method,
        Method::GET
            | Method::POST
            | Method::PUT
            | Method::DELETE
            | Method::PATCH
            | Method::HEAD
            | Method::OPTIONS
            | Method::CONNECT
            | Method::TRACE
    ) {
        return Err(format!("Invalid HTTP method: {}", method));
    }

    Ok(method)
}

/// Points at the first occurrence of `needle`, preferring a quoted one.
fn find_span(needle: &str, src: &str) -> Option<SourceSpan> {
    if needle.is_empty() {
        return None;
    }

    let quoted = format!("\"{}\"", needle);
    src.find(&quoted)
        .map(|start| start + 1)
        .or_else(|| src.find(needle))
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}

#[cfg(test)]
mod test {
    use crate::parser::Format;
    use crate::parser::TestSuite;

    use super::*;

    fn validate(src: &str) -> Result<SuitePlan, ValidationError> {
        let suite = TestSuite::parse(src, Format::Yaml, "suite.yaml").unwrap();
        Validator::new(&suite, src, "suite.yaml").validate()
    }

    const SUITE: &str = r#"
ignoreCase: true
baseA:
  url: http://legacy.local
  headers:
    Authorization: Bearer a
    X-Trace: base
baseB:
  url: http://next.local
tests:
  - name: get user
    method: get
    apiA:
      path: /users/:id
      headers:
        X-Trace: api
    apiB:
      path: /v2/users/:id
    ignoreFields: [Updated_At]
    fieldMappings:
      - path: Profile
        mappings:
          Nick_Name: Display_Name
    cases:
      - name: first
        apiA:
          pathParams: { id: 1 }
          headers:
            X-Case: "1"
"#;

    #[test]
    fn builds_plan() {
        let plan = validate(SUITE).unwrap();
        let test = &plan.tests[0];

        assert!(plan.ignore_case);
        assert_eq!(test.method, Method::GET);
        assert_eq!(test.api_a.headers["authorization"], "Bearer a");
        assert_eq!(test.api_a.headers["x-trace"], "api");
        assert!(test.api_b.headers.is_empty());
        assert_eq!(test.cases[0].api_a.headers["x-case"], "1");
        assert!(test.cases[0].api_b.path_params.is_none());
    }

    #[test]
    fn folds_ignore_fields_and_mappings_when_ignoring_case() {
        let plan = validate(SUITE).unwrap();
        let test = &plan.tests[0];

        assert_eq!(test.ignore_fields, vec!["updatedat"]);
        assert_eq!(test.field_mappings[0].path, "profile");
        assert_eq!(test.field_mappings[0].rename("nickname"), "displayname");
    }

    #[test]
    fn keeps_names_when_case_matters() {
        let src = SUITE.replace("ignoreCase: true", "ignoreCase: false");
        let plan = validate(&src).unwrap();

        assert_eq!(plan.tests[0].ignore_fields, vec!["Updated_At"]);
        assert_eq!(plan.tests[0].field_mappings[0].path, "Profile");
    }

    #[test]
    fn rejects_unknown_method() {
        let src = SUITE.replace("method: get", "method: \"FETCH ME\"");

        let err = validate(&src).unwrap_err();
        assert!(err.to_string().contains("method"));
    }

    #[test]
    fn rejects_base_url_with_trailing_slash() {
        let src = SUITE.replace("http://next.local", "http://next.local/");

        let err = validate(&src).unwrap_err();
        assert!(err.to_string().contains("baseB.url"));
    }

    #[test]
    fn rejects_path_without_leading_slash() {
        let src = SUITE.replace("path: /v2/users/:id", "path: v2/users/:id");

        assert!(validate(&src).is_err());
    }

    #[test]
    fn rejects_invalid_header_name() {
        let src = SUITE.replace("X-Case", "\"X Case\"");

        let err = validate(&src).unwrap_err();
        assert!(err.to_string().contains("Invalid header name"));
    }

    #[test]
    fn rejects_empty_mapping_segment() {
        let src = SUITE.replace("path: Profile", "path: Profile..Name");

        let err = validate(&src).unwrap_err();
        assert!(err.to_string().contains("empty path segment"));
    }

    #[test]
    fn parameter_values_are_not_checked_for_type() {
        let src = SUITE.replace("pathParams: { id: 1 }", "pathParams: { id: { nested: true } }");

        let plan = validate(&src).unwrap();
        let params = plan.tests[0].cases[0].api_a.path_params.as_ref().unwrap();
        assert_eq!(params["id"], serde_json::json!({ "nested": true }));
    }

    #[test]
    fn demo_suites_are_valid() {
        let yaml = include_str!("../demos/suite.yaml");
        let plan = validate(yaml).unwrap();
        assert_eq!(plan.tests.len(), 2);
        assert_eq!(plan.tests[0].ignore_fields, vec!["updatedat", "requestid"]);

        let toml_src = include_str!("../demos/suite.toml");
        let suite = TestSuite::parse(toml_src, Format::Toml, "suite.toml").unwrap();
        let plan = Validator::new(&suite, toml_src, "suite.toml").validate().unwrap();
        assert_eq!(plan.tests[0].field_mappings[0].rename("orderlines"), "items");
    }

    #[test]
    fn overlay_replaces_by_name() {
        let mut base = HeaderMap::new();
        base.insert("a", HeaderValue::from_static("1"));
        base.insert("b", HeaderValue::from_static("2"));

        let mut top = HeaderMap::new();
        top.insert("b", HeaderValue::from_static("3"));

        overlay(&mut base, top);

        assert_eq!(base["a"], "1");
        assert_eq!(base["b"], "3");
        assert_eq!(base.len(), 2);
    }
}
