use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use lock3r_contracts::document::{InMemoryDocument, InMemoryElement};
use lock3r_contracts::{ElementId, FieldId, FieldValue};
use ulid::Ulid;

const E1: ElementId = ElementId(1);
const F1: FieldId = FieldId::from_u128(0x6f1e_02b7_93c4_4d58_a7e0_54c1_9b3d_0001);
const F2: FieldId = FieldId::from_u128(0x6f1e_02b7_93c4_4d58_a7e0_54c1_9b3d_0002);
const F3: FieldId = FieldId::from_u128(0x6f1e_02b7_93c4_4d58_a7e0_54c1_9b3d_0003);

const CONFIG_KEYS: [&str; 5] = [
    "LOCK3R_CONFIG_PATH",
    "LOCK3R_RECORD_EXTENSION",
    "LOCK3R_ESTABLISH_ON_OPEN",
    "LOCK3R_FAILURE_ID",
    "LOCK3R_CLOSE_ON_CORRUPT",
];

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lock3r-cli-test-{}", Ulid::new()));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

fn write_document(root: &Path) -> PathBuf {
    let path = root.join("tower.json");
    let mut doc = InMemoryDocument::new(&path);
    doc.insert_element(
        InMemoryElement::new(E1, "WallType", "Generic - 200mm")
            .with_field(F1, true, FieldValue::Text("100".to_string()))
            .with_field(F2, false, FieldValue::Text("free".to_string()))
            .with_field(F3, true, FieldValue::None),
    );
    doc.write_json_file().expect("document should be written");
    path
}

fn lock3r_with_env(env: &[(&str, &str)], args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_lock3r"));
    for key in CONFIG_KEYS {
        command.env_remove(key);
    }
    command
        .envs(env.iter().copied())
        .args(args)
        .output()
        .expect("lock3r binary should run")
}

fn lock3r(args: &[&str]) -> Output {
    lock3r_with_env(&[], args)
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is utf-8")
}

#[test]
fn set_vetoes_divergent_value_and_leaves_document_untouched() {
    let root = temp_dir();
    let doc = write_document(&root);
    let establish = lock3r(&["establish", path_arg(&doc)]);
    assert!(establish.status.success(), "establish failed: {:?}", establish);
    let before = fs::read(&doc).expect("document should be readable");

    let out = lock3r(&[
        "set",
        path_arg(&doc),
        &E1.to_string(),
        &F1.to_string(),
        "200",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Permission Denied"));
    assert_eq!(fs::read(&doc).expect("document should be readable"), before);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn set_writes_unprotected_field() {
    let root = temp_dir();
    let doc = write_document(&root);
    assert!(lock3r(&["establish", path_arg(&doc)]).status.success());

    let out = lock3r(&[
        "set",
        path_arg(&doc),
        &E1.to_string(),
        &F2.to_string(),
        "edited",
    ]);
    assert!(out.status.success(), "set failed: {:?}", out);

    let reloaded = InMemoryDocument::from_json_file(&doc).expect("document should reload");
    assert_eq!(
        reloaded.field_value(E1, F2),
        Some(&FieldValue::Text("edited".to_string()))
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn set_refuses_field_without_typed_value() {
    let root = temp_dir();
    let doc = write_document(&root);
    assert!(lock3r(&["establish", path_arg(&doc)]).status.success());
    let before = fs::read(&doc).expect("document should be readable");

    let out = lock3r(&[
        "set",
        path_arg(&doc),
        &E1.to_string(),
        &F3.to_string(),
        "250",
    ]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("holds no typed value"), "stderr: {}", stderr);
    assert!(!String::from_utf8_lossy(&out.stdout).contains("updated"));
    assert_eq!(fs::read(&doc).expect("document should be readable"), before);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn help_works_with_invalid_configuration() {
    let bad_extension = [("LOCK3R_RECORD_EXTENSION", "bad.ext")];
    let help = lock3r_with_env(&bad_extension, &["--help"]);
    assert!(help.status.success());
    assert!(String::from_utf8_lossy(&help.stdout).contains("establish"));

    let root = temp_dir();
    let doc = write_document(&root);
    let out = lock3r_with_env(&bad_extension, &["establish", path_arg(&doc)]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("STARTUP_ERROR"));

    let _ = fs::remove_dir_all(root);
}
