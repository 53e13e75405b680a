//! Failure handling: fatal limits, rejected configuration, and fail-open paths

use pathtab_codec::mapper::{CapabilityRegistry, MapperCache, MapperConfig};
use pathtab_io::{
    render_to_string, Limits, OutputMode, PathTabError, RenderConfig, TabularRenderer,
};
use serde::ser::{Error as _, Serializer};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

fn limited(max_output_bytes: usize, mode: OutputMode) -> RenderConfig {
    RenderConfig::builder()
        .mode(mode)
        .limits(Limits {
            max_output_bytes,
            ..Limits::default()
        })
        .build()
        .unwrap()
}

#[test]
fn output_limit_is_fatal_and_reports_sizes() {
    let config = limited(16, OutputMode::Csv);
    let rows: Vec<_> = (0..10).map(|i| json!({"value": i})).collect();

    match render_to_string(&rows, &config) {
        Err(PathTabError::LimitExceeded { what, limit, actual }) => {
            assert_eq!(what, "output bytes");
            assert_eq!(limit, 16);
            assert!(actual > 16);
        }
        other => panic!("expected limit error, got {:?}", other),
    }
}

#[test]
fn output_limit_applies_to_every_text_mode() {
    for mode in [OutputMode::Html, OutputMode::HtmlEmail, OutputMode::FlattenedJson] {
        let err = render_to_string(&json!([{"a": "long enough"}]), &limited(8, mode)).unwrap_err();
        assert!(err.is_limit_exceeded(), "{:?}", mode);
    }
}

#[test]
fn output_limit_applies_to_workbooks() {
    let config = limited(4, OutputMode::Xlsx);
    let err = TabularRenderer::new(&config)
        .render_workbook(&json!([{"header": "value"}]))
        .unwrap_err();
    assert!(err.is_limit_exceeded());
}

#[test]
fn row_limit_is_fatal() {
    let config = RenderConfig::builder()
        .limits(Limits {
            max_rows: 3,
            ..Limits::default()
        })
        .build()
        .unwrap();
    let err = render_to_string(&json!([1, 2, 3, 4]), &config).unwrap_err();
    assert!(err.is_limit_exceeded());
}

#[test]
fn invalid_configuration_is_rejected_at_build() {
    assert!(RenderConfig::builder().delimiter('"').build().is_err());
    assert!(RenderConfig::builder().chaining_separator("[").build().is_err());
    assert!(RenderConfig::builder().data_pointer("items").build().is_err());
    assert!(RenderConfig::builder()
        .skip_property("@REGEX@(")
        .build()
        .is_err());
    assert!(RenderConfig::builder()
        .limits(Limits {
            max_rows: usize::MAX,
            ..Limits::default()
        })
        .build()
        .is_err());
}

#[test]
fn malformed_pointer_escapes_fail() {
    let config = RenderConfig::builder().data_pointer("/a~2").build().unwrap();
    let err = render_to_string(&json!({"a": []}), &config).unwrap_err();
    assert!(matches!(err, PathTabError::InvalidExpression { .. }));
}

#[test]
fn broken_skip_expressions_keep_rows() {
    let config = RenderConfig::builder().skip_row_if("a ==").build().unwrap();
    let text = render_to_string(&json!([{"a": 1}, {"a": 2}]), &config).unwrap();
    assert_eq!(text, "a\n1\n2\n");
}

struct Broken;

impl Serialize for Broken {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("cannot serialize"))
    }
}

#[test]
fn unserializable_values_render_an_empty_table() {
    let config = RenderConfig::builder().always_include("id").build().unwrap();
    let text = render_to_string(&Broken, &config).unwrap();
    assert_eq!(text, "id\n");
}

#[derive(Serialize)]
struct Row {
    id: u32,
    extra: Option<Broken>,
}

#[test]
fn one_broken_field_leaves_the_other_rows_intact() {
    let rows = vec![
        Row { id: 1, extra: None },
        Row { id: 2, extra: Some(Broken) },
        Row { id: 3, extra: None },
    ];
    let text = render_to_string(&rows, &RenderConfig::default()).unwrap();
    assert_eq!(text, "extra,id\n,1\n,2\n,3\n");
}

#[test]
fn broken_elements_render_as_empty_rows() {
    let items: Vec<Option<Broken>> = vec![None, Some(Broken)];
    let config = RenderConfig::builder().always_include("id").build().unwrap();
    let text = render_to_string(&items, &config).unwrap();
    assert_eq!(text, "id,value\n,\n,\n");
}

#[test]
fn unknown_graph_is_reported() {
    let cache = MapperCache::new(Arc::new(CapabilityRegistry::new()));
    let err = cache
        .resolve(&MapperConfig::builder().graph("missing").build().unwrap())
        .unwrap_err();
    assert!(matches!(err, PathTabError::UnknownGraph { .. }));
}

#[test]
fn workbook_mode_has_no_text_form() {
    let config = RenderConfig::builder().mode(OutputMode::Xlsx).build().unwrap();
    let err = render_to_string(&json!([{"a": 1}]), &config).unwrap_err();
    assert!(matches!(err, PathTabError::InvalidConfig(_)));
}
