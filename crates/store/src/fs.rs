//! Whole-file replace primitives shared by the file-backed stores.

use std::io::ErrorKind;
use std::path::Path;

use quarry_common::error::{QuarryError, QuarryResult};
use tokio::io::AsyncWriteExt;

/// Write `content` to `path` so readers observe either the previous file or
/// the complete new one, never a torn write.
///
/// The data goes to a uniquely named sibling first and is then renamed over
/// the target; rename within one directory is atomic on POSIX filesystems.
pub async fn atomic_write(path: &Path, content: &[u8]) -> QuarryResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| QuarryError::io(parent, e))?;

    let tmp_path = parent.join(format!(".tmp.{}.quarry", uuid::Uuid::new_v4()));

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| QuarryError::io(&tmp_path, e))?;
    let written = async {
        file.write_all(content).await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(QuarryError::io(&tmp_path, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(QuarryError::io(path, e));
    }

    Ok(())
}

/// Read a file, mapping "does not exist" to `None`.
pub async fn read_optional(path: &Path) -> QuarryResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(QuarryError::io(path, e)),
    }
}

/// Remove a file; returns whether it existed.
pub async fn remove_if_exists(path: &Path) -> QuarryResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(QuarryError::io(path, e)),
    }
}

/// File names in `dir`, skipping hidden entries (including in-flight temp
/// files). A missing directory lists as empty.
pub async fn list_file_names(dir: &Path) -> QuarryResult<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(QuarryError::io(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| QuarryError::io(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/doc.json");
        atomic_write(&path, b"{}").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn atomic_write_replaces_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write(&path, b"a much longer first version")
            .await
            .unwrap();
        atomic_write(&path, b"short").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"short");
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write(&path, b"1").await.unwrap();
        atomic_write(&path, b"2").await.unwrap();

        let mut entries = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec!["doc.json"]);
    }

    #[tokio::test]
    async fn read_optional_maps_missing_to_none() {
        let dir = tempdir().unwrap();
        let missing = read_optional(&dir.path().join("nope")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn remove_if_exists_reports_presence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x");
        assert!(!remove_if_exists(&path).await.unwrap());
        atomic_write(&path, b"x").await.unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn list_file_names_skips_hidden_and_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(list_file_names(&dir.path().join("absent"))
            .await
            .unwrap()
            .is_empty());

        std::fs::write(dir.path().join("B.json"), "{}").unwrap();
        std::fs::write(dir.path().join("A.json"), "{}").unwrap();
        std::fs::write(dir.path().join(".tmp.123.quarry"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let names = list_file_names(dir.path()).await.unwrap();
        assert_eq!(names, vec!["A.json", "B.json"]);
    }
}
