//! Integration tests for file extraction through the `dq` binary:
//! DOCX text reaches retrieval, corrupt files are rejected, and
//! unsupported extensions fail before anything is ingested.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("dq");
    path
}

/// Minimal docx (ZIP) whose `word/document.xml` holds one paragraph per entry.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("dq.toml");
    fs::write(&config_path, "[retrieval]\ntop_k = 3\n").unwrap();
    (tmp, config_path)
}

fn run_dq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(dq_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dq");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn file_support_docx_answer() {
    let (tmp, config) = setup();
    let path = tmp.path().join("policy.docx");
    fs::write(
        &path,
        minimal_docx(&[
            "Refunds are issued within thirty days of purchase.",
            "Shipping is free for orders above fifty euros.",
        ]),
    )
    .unwrap();

    let (stdout, stderr, success) = run_dq(
        &config,
        &["ask", "when are refunds issued", "--file", path.to_str().unwrap(), "--json"],
    );
    assert!(success, "ask failed: {}", stderr);
    let answer: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(answer["text"]
        .as_str()
        .unwrap()
        .contains("Refunds are issued within thirty days"));
    assert_eq!(answer["sources"][0]["document_title"], "policy.docx");
}

#[test]
fn file_support_docx_paragraphs_become_lines() {
    let (tmp, config) = setup();
    let path = tmp.path().join("two.docx");
    fs::write(&path, minimal_docx(&["first", "second"])).unwrap();

    let (stdout, stderr, success) =
        run_dq(&config, &["chunk", path.to_str().unwrap(), "--json"]);
    assert!(success, "chunk failed: {}", stderr);
    let preview: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(preview["kind"], "docx");
    // "first\nsecond"
    assert_eq!(preview["char_count"], 12);
}

#[test]
fn file_support_corrupt_pdf_rejected() {
    let (tmp, config) = setup();
    let path = tmp.path().join("bad.pdf");
    fs::write(&path, b"not a valid pdf").unwrap();

    let (_, stderr, success) = run_dq(&config, &["ask", "anything", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("PDF extraction failed"), "stderr: {}", stderr);
}

#[test]
fn file_support_corrupt_docx_rejected() {
    let (tmp, config) = setup();
    let path = tmp.path().join("bad.docx");
    fs::write(&path, b"not a zip").unwrap();

    let (_, stderr, success) = run_dq(&config, &["ask", "anything", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("DOCX extraction failed"), "stderr: {}", stderr);
}

#[test]
fn file_support_unsupported_extension() {
    let (tmp, config) = setup();
    let path = tmp.path().join("deck.pptx");
    fs::write(&path, b"whatever").unwrap();

    let (_, stderr, success) = run_dq(&config, &["ask", "anything", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"), "stderr: {}", stderr);
}

#[test]
fn file_support_empty_text_file_rejected() {
    let (tmp, config) = setup();
    let path = tmp.path().join("blank.txt");
    fs::write(&path, "  \r\n\r\n  ").unwrap();

    let (_, stderr, success) = run_dq(&config, &["ask", "anything", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("blank.txt"), "stderr: {}", stderr);
}
