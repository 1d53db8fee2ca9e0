use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn bindscope(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bindscope"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("BINDSCOPE_CONFIG")
        .output()
        .unwrap()
}

/// Write a small snapshot with one instance and one loose rectangle
fn write_document(dir: &Path) -> String {
    let path = dir.join("doc.json");
    std::fs::write(
        &path,
        r#"{
  "definitions": [ { "id": "V:1", "name": "color/brand", "key": "key-x" } ],
  "aliasKeys": { "V:lib": "key-x" },
  "pages": [
    { "id": "0:1", "name": "Home", "type": "page", "children": [
      { "id": "1:1", "name": "Button", "type": "instance", "children": [
        { "id": "1:2", "name": "Label", "type": "text",
          "properties": { "fills": [ { "color": { "alias": "V:lib" } } ] } },
        { "id": "1:3", "name": "Bg", "type": "rectangle",
          "properties": { "fills": [ { "color": { "alias": "V:1" } } ] } }
      ]},
      { "id": "2:1", "name": "Divider", "type": "line",
        "properties": { "strokes": [ { "color": { "alias": "V:1" } } ] } }
    ]}
  ]
}"#,
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "bindscope failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_search_json_direct() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());

    let json = stdout_json(&bindscope(&["search", &doc, "--definition", "V:1", "--json"]));
    let ids: Vec<&str> = json["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["nodeId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["1:2", "1:3", "2:1"]);
    assert_eq!(json["records"][0]["pathString"], "Home / Button / Label");
    assert_eq!(json["summary"]["byCategory"]["fill"], 2);
    assert_eq!(json["cancelled"], false);
}

#[test]
fn test_search_json_representative() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());

    let json = stdout_json(&bindscope(&[
        "search",
        &doc,
        "--definition",
        "V:1",
        "--mode",
        "representative-only",
        "--json",
    ]));
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["nodeId"], "1:1");
    assert_eq!(records[0]["nodeType"], "instance");
}

#[test]
fn test_default_mode_from_config() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());
    let config = dir.path().join("bindscope.toml");
    std::fs::write(&config, "[search]\ndefault_mode = \"representative-only\"\n").unwrap();

    let json = stdout_json(&bindscope(&[
        "search",
        &doc,
        "--definition",
        "V:1",
        "--config",
        config.to_str().unwrap(),
        "--json",
    ]));
    assert_eq!(json["mode"], "representative-only");
    assert_eq!(json["records"].as_array().unwrap().len(), 1);
}

#[test]
fn test_unknown_scope_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());

    let json = stdout_json(&bindscope(&[
        "search",
        &doc,
        "--definition",
        "V:1",
        "--scope",
        "9:9",
        "--json",
    ]));
    assert!(json["records"].as_array().unwrap().is_empty());
    assert_eq!(json["diagnostics"][0]["kind"], "scope_not_found");
}

#[test]
fn test_text_output_lists_paths() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());

    let output = bindscope(&["search", &doc, "--definition", "V:1", "--quiet"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("color/brand"));
    assert!(stdout.contains("Home / Divider"));
    assert!(stdout.contains("strokes[0].color"));
}

#[test]
fn test_unknown_mode_fails() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(dir.path());

    let output = bindscope(&["search", &doc, "--definition", "V:1", "--mode", "sideways"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Unknown search mode"));
}

#[test]
fn test_missing_document_fails_with_json_error() {
    let output = bindscope(&["search", "/nonexistent/doc.json", "--definition", "V:1", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let error: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["code"], "file_not_found");
}

#[test]
fn test_config_prints_defaults() {
    let output = bindscope(&["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("progress_every = 10"));
    assert!(stdout.contains("[logging]"));
}
