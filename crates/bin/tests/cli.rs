use std::{
    io::Write,
    process::{Command, Output, Stdio},
};

use tempfile::NamedTempFile;

fn stencil(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_stencil"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // The process may exit without reading its input.
    let mut input = child.stdin.take().unwrap();
    input.write_all(stdin.as_bytes()).ok();
    drop(input);

    child.wait_with_output().unwrap()
}

fn template(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn stdout(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap()
}

fn stderr(output: &Output) -> &str {
    std::str::from_utf8(&output.stderr).unwrap()
}

#[test]
fn mustache_from_file() {
    let file = template("Hello {{name}}!");
    let path = file.path().to_str().unwrap();

    let output = stencil(&["--file", path, "name=World", "-m"], "");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Hello World!");
    assert_eq!(stderr(&output), "");
}

#[test]
fn default_syntax_is_mustache() {
    let output = stencil(&["--name", "you"], "{{name}} :name");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "you :name");
}

#[test]
fn go_template_from_stdin() {
    let output = stencil(
        &["-g", "--variables", "a=1,b=2"],
        "{{range $k, $v := .}}{{$k}}={{$v}}\n{{end}}",
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "a=1\nb=2\n");
}

#[test]
fn colon_by_type() {
    let output = stencil(&["--type", "colon", "a=1", "ab=2"], ":a :ab");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "1 2");
}

#[test]
fn help() {
    let output = stencil(&["-h", "--dangling"], "");
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage: stencil"), "{}", stdout(&output));
}

#[test]
fn version() {
    let output = stencil(&["--version"], "");
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        concat!("stencil ", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn missing_value() {
    let output = stencil(&["--name"], "{{name}}");
    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output), "stencil: missing value for `--name`\n");
}

#[test]
fn unknown_syntax() {
    let output = stencil(&["--type", "jinja"], "");
    assert_eq!(output.status.code(), Some(68));
    assert_eq!(stderr(&output), "stencil: unknown template syntax `jinja`\n");
}

#[test]
fn template_syntax_error() {
    let output = stencil(&["--go"], "line\n{{ if .x }}");
    assert_eq!(output.status.code(), Some(67));
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output), "stencil: go template, line 2: unexpected EOF\n");
}

#[test]
fn execution_error_writes_nothing() {
    let output = stencil(&["-g", "a=text"], "before {{.a.b}} after");
    assert_eq!(output.status.code(), Some(67));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).starts_with("stencil: go template, line 1: executing"));
}

#[test]
fn unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.tmpl");

    let output = stencil(&["-f", path.to_str().unwrap()], "");
    assert_eq!(output.status.code(), Some(74));
    assert!(stderr(&output).contains("missing.tmpl"), "{}", stderr(&output));
}

#[test]
fn logs_go_to_stderr() {
    let output = stencil(&["--log-level", "debug", "-c"], ":x");
    assert!(output.status.success());
    assert_eq!(stdout(&output), ":x");
    assert!(stderr(&output).contains("colon"), "{}", stderr(&output));
}
