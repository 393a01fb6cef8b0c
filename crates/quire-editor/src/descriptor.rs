//! Reading and writing entity descriptor documents.
//!
//! Descriptors are JSON objects written with four-space indentation and a
//! trailing newline. Key order and unknown fields survive a read/modify/write
//! cycle.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{EditError, EditResult};

/// Parse the descriptor at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn read(path: &Path) -> EditResult<Value> {
    let raw = fs::read_to_string(path).map_err(|source| EditError::io("descriptor.read", path, source))?;
    serde_json::from_str(&raw).map_err(|source| EditError::json("descriptor.parse", path, source))
}

/// Overwrite the descriptor at `path`.
///
/// # Errors
///
/// Returns an error if the document cannot be serialised or written.
pub fn write(path: &Path, document: &Value) -> EditResult<()> {
    let bytes = render(path, document)?;
    fs::write(path, bytes).map_err(|source| EditError::io("descriptor.write", path, source))
}

/// Create a new descriptor at `path`, creating missing parent directories.
///
/// # Errors
///
/// Returns [`EditError::MutationFailure`] if the file already exists, or an IO
/// error if it cannot be created.
pub fn create(path: &Path, document: &Value) -> EditResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| EditError::io("descriptor.create_parent", parent, source))?;
    }
    let bytes = render(path, document)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                EditError::mutation("descriptor.create", path, "already_exists")
            } else {
                EditError::io("descriptor.create", path, source)
            }
        })?;
    file.write_all(&bytes)
        .map_err(|source| EditError::io("descriptor.create", path, source))
}

/// Set `key` on a descriptor object, keeping its position when it already exists.
///
/// # Errors
///
/// Returns [`EditError::MutationFailure`] if the document is not a JSON object.
pub fn set_field(path: &Path, document: &mut Value, key: &str, value: Value) -> EditResult<()> {
    let object = as_object(path, document)?;
    object.insert(key.to_string(), value);
    Ok(())
}

/// String value of `key`, if present.
#[must_use]
pub fn string_field<'a>(document: &'a Value, key: &str) -> Option<&'a str> {
    document.get(key).and_then(Value::as_str)
}

/// Fresh descriptor UUID.
#[must_use]
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Give a freshly copied entity a new UUID and display name.
///
/// Sets `name_field` to `name` and `uuid` to a fresh value, then rewrites the
/// descriptor in place. Returns the new UUID.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be read, is not an object, or
/// cannot be written.
pub fn restamp(path: &Path, name_field: &str, name: &str) -> EditResult<String> {
    let mut document = read(path)?;
    let uuid = new_uuid();
    set_field(path, &mut document, name_field, Value::String(name.to_string()))?;
    set_field(path, &mut document, "uuid", Value::String(uuid.clone()))?;
    write(path, &document)?;
    Ok(uuid)
}

/// Replace references to question `old` with `new` in an assessment descriptor.
///
/// Each zone's question entries are searched; an entry with an `alternatives`
/// list is matched through its alternatives only. Returns whether any
/// reference was rewritten.
pub fn replace_question_id(document: &mut Value, old: &str, new: &str) -> bool {
    let mut found = false;
    let Some(zones) = document.get_mut("zones").and_then(Value::as_array_mut) else {
        return false;
    };
    for zone in zones {
        let Some(questions) = zone.get_mut("questions").and_then(Value::as_array_mut) else {
            continue;
        };
        for question in questions {
            if let Some(alternatives) = question.get_mut("alternatives").and_then(Value::as_array_mut)
            {
                for alternative in alternatives {
                    found |= replace_id(alternative, old, new);
                }
            } else {
                found |= replace_id(question, old, new);
            }
        }
    }
    found
}

fn replace_id(entry: &mut Value, old: &str, new: &str) -> bool {
    match entry.get_mut("id") {
        Some(id) if id.as_str() == Some(old) => {
            *id = Value::String(new.to_string());
            true
        }
        _ => false,
    }
}

fn as_object<'a>(path: &Path, document: &'a mut Value) -> EditResult<&'a mut Map<String, Value>> {
    document
        .as_object_mut()
        .ok_or_else(|| EditError::mutation("descriptor.update", path, "not_an_object"))
}

fn render(path: &Path, document: &Value) -> EditResult<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    document
        .serialize(&mut serializer)
        .map_err(|source| EditError::json("descriptor.serialize", path, source))?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    type TestResult<T> = Result<T>;

    #[test]
    fn write_preserves_key_order_and_indent() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("info.json");
        fs::write(&path, r#"{"title":"A","uuid":"old","custom":{"k":1}}"#)?;

        let mut doc = read(&path)?;
        set_field(&path, &mut doc, "uuid", json!("new"))?;
        write(&path, &doc)?;

        let written = fs::read_to_string(&path)?;
        assert_eq!(
            written,
            "{\n    \"title\": \"A\",\n    \"uuid\": \"new\",\n    \"custom\": {\n        \"k\": 1\n    }\n}\n"
        );
        Ok(())
    }

    #[test]
    fn create_refuses_to_overwrite() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/infoCourseInstance.json");
        create(&path, &json!({"uuid": "a"}))?;
        let err = create(&path, &json!({"uuid": "b"})).err();
        assert!(matches!(
            err,
            Some(EditError::MutationFailure {
                reason: "already_exists",
                ..
            })
        ));
        assert_eq!(string_field(&read(&path)?, "uuid"), Some("a"));
        Ok(())
    }

    #[test]
    fn set_field_rejects_non_objects() {
        let mut doc = json!([1, 2]);
        assert!(set_field(Path::new("x.json"), &mut doc, "uuid", json!("u")).is_err());
    }

    #[test]
    fn replace_question_id_handles_alternatives() {
        let mut doc = json!({
            "zones": [
                {"questions": [{"id": "q1"}, {"id": "q2"}]},
                {"questions": [{"alternatives": [{"id": "q3"}, {"id": "q1"}], "id": "q1"}]}
            ]
        });
        assert!(replace_question_id(&mut doc, "q1", "renamed"));
        assert_eq!(doc["zones"][0]["questions"][0]["id"], "renamed");
        assert_eq!(doc["zones"][0]["questions"][1]["id"], "q2");
        assert_eq!(doc["zones"][1]["questions"][0]["alternatives"][1]["id"], "renamed");
        assert_eq!(doc["zones"][1]["questions"][0]["id"], "q1");
        assert!(!replace_question_id(&mut doc, "missing", "x"));
    }

    #[test]
    fn new_uuids_are_distinct() {
        assert_ne!(new_uuid(), new_uuid());
    }
}
