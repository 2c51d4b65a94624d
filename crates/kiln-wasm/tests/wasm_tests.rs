//! Tests for the JSON surface of `kiln-wasm`, run natively.

use kiln_wasm::{check, render_preview, render_preview_with_config, resolve, version};
use serde_json::Value;

fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("valid json")
}

const FILES: &str = r#"[
  {"path": "index.tsx", "code": "import Title from './Title';\nexport default function App() { return <Title text=\"Hi\" />; }"},
  {"path": "Title.tsx", "code": "export default function Title({ text }: { text: string }) { return <h1>{text}</h1>; }"}
]"#;

#[test]
fn test_render_preview_mounts() {
    let report = parse(&render_preview(FILES, None));
    assert_eq!(report["entry"], "index.tsx");
    assert_eq!(report["outcome"]["status"], "mounted");
    assert_eq!(report["outcome"]["html"], "<h1>Hi</h1>");
}

#[test]
fn test_entry_override() {
    let report = parse(&render_preview(FILES, Some("Title.tsx".into())));
    assert_eq!(report["entry"], "Title.tsx");
    assert_eq!(report["outcome"]["html"], "<h1></h1>");
}

#[test]
fn test_malformed_input_is_a_diagnostic() {
    let report = parse(&render_preview("{not json", None));
    assert_eq!(report["outcome"]["status"], "diagnostic");
    assert_eq!(report["outcome"]["diagnostic"]["title"], "Preview Error");
}

#[test]
fn test_config_is_applied() {
    let files = r#"[{"path": "App.tsx", "code": "export default function App() { while (true) {} }"}]"#;
    let report = parse(&render_preview_with_config(files, None, r#"{"gas_limit": 1000}"#));
    assert_eq!(report["outcome"]["status"], "diagnostic");
    let bad = parse(&render_preview_with_config(files, None, r#""lots""#));
    assert_eq!(bad["outcome"]["status"], "diagnostic");
}

#[test]
fn test_config_pins_the_clock() {
    let files = r#"[{"path": "App.tsx", "code": "export default function App() { return <p>{new Date().toISOString()}</p>; }"}]"#;
    let report = parse(&render_preview_with_config(files, None, r#"{"clock_ms": 86400000}"#));
    assert_eq!(report["outcome"]["html"], "<p>1970-01-02T00:00:00.000Z</p>");
}

#[test]
fn test_resolve() {
    assert_eq!(
        parse(&resolve("index.tsx", "./Title", FILES)),
        serde_json::json!({"kind": "file", "target": "Title.tsx"})
    );
    assert_eq!(
        parse(&resolve("index.tsx", "react", FILES)),
        serde_json::json!({"kind": "capability", "target": "react"})
    );
    assert_eq!(parse(&resolve("index.tsx", "./Nope", FILES))["kind"], "unresolved");
}

#[test]
fn test_check() {
    assert_eq!(parse(&check("export const x = 1;", "x.ts"))["total_errors"], 0);
    let failed = parse(&check("export const = 1;", "x.ts"));
    assert!(failed["total_errors"].as_u64().unwrap_or(0) >= 1);
}

#[test]
fn test_version() {
    assert_eq!(version(), "0.1.0");
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use serde::Serialize;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_render_preview_value() {
        let files = serde_json::json!([{"path": "App.tsx", "code": "export default () => <p>js</p>;"}]);
        let input = files
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .expect("js value");
        let output = kiln_wasm::render_preview_value(input, None).expect("report");
        let report: serde_json::Value = serde_wasm_bindgen::from_value(output).expect("json value");
        assert_eq!(report["outcome"]["html"], "<p>js</p>");
    }
}
