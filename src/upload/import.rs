use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

const IMPORTS_DIR: &str = "imports";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Directory of one import session written by the share extension.
///
/// Files live in `<base>/imports/<uuid>/`. Session ids are UUIDs so the
/// directory always stays inside `<base>/imports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportHelper {
    import_uuid: Uuid,
    import_dir: PathBuf,
}

impl ImportHelper {
    pub fn new(base_dir: &Path, import_uuid: Uuid) -> Self {
        Self::with_dir_name(base_dir, import_uuid, &import_uuid.hyphenated().to_string())
    }

    /// Session for an id received from outside the app, `None` unless it
    /// is a UUID. The id's spelling (e.g. upper case) is kept for the
    /// directory name.
    pub fn parse(base_dir: &Path, import_uuid: &str) -> Option<Self> {
        let uuid = Uuid::parse_str(import_uuid).ok()?;
        Some(Self::with_dir_name(base_dir, uuid, import_uuid))
    }

    fn with_dir_name(base_dir: &Path, import_uuid: Uuid, dir_name: &str) -> Self {
        Self {
            import_uuid,
            import_dir: base_dir.join(IMPORTS_DIR).join(dir_name),
        }
    }

    /// A new session with a random id.
    pub fn generate(base_dir: &Path) -> Self {
        Self::new(base_dir, Uuid::new_v4())
    }

    pub fn import_uuid(&self) -> Uuid {
        self.import_uuid
    }

    pub fn import_dir(&self) -> &Path {
        &self.import_dir
    }

    /// Visible regular files of the session. Empty if the directory is
    /// missing or unreadable.
    pub fn imported_file_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.import_dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path())
            .collect();
        paths.sort();
        paths
    }

    /// Move `paths` into the session directory, keeping their file names.
    pub async fn move_files_to_import_directory(&self, paths: &[PathBuf]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.import_dir).await?;
        for path in paths {
            let Some(name) = path.file_name() else {
                continue;
            };
            move_file(path, &self.import_dir.join(name)).await?;
        }
        Ok(())
    }
}

/// Rename `from` to `to`, copying then removing the source when a rename is
/// not possible (e.g. across filesystems).
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(e),
        Err(rename_error) => {
            tracing::debug!(
                from = %from.display(),
                error = %rename_error,
                "Rename failed, copying instead"
            );
            copy_then_remove(from, to).await.map_err(|_| rename_error)
        }
    }
}

async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

/// A file offered to the web app for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedFile {
    #[serde(rename = "ref")]
    pub reference: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(skip)]
    pub path: PathBuf,
}

impl ImportedFile {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        Self {
            reference: Uuid::new_v4().to_string(),
            name,
            mime_type,
            size,
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SESSION: &str = "6f9c2b4e-1d3a-4c5b-9e8f-0a1b2c3d4e5f";

    #[test]
    fn import_dir_is_nested_under_imports() {
        let helper = ImportHelper::parse(Path::new("/container"), SESSION).unwrap();
        assert_eq!(
            helper.import_dir(),
            Path::new("/container/imports/6f9c2b4e-1d3a-4c5b-9e8f-0a1b2c3d4e5f")
        );
        assert_eq!(helper.import_uuid().to_string(), SESSION);
    }

    #[test]
    fn parsed_session_keeps_spelling() {
        let upper = SESSION.to_uppercase();
        let helper = ImportHelper::parse(Path::new("/container"), &upper).unwrap();
        assert_eq!(helper.import_dir(), Path::new("/container/imports").join(&upper));
        assert_eq!(helper.import_uuid().to_string(), SESSION);
    }

    #[test]
    fn non_uuid_session_ids_are_refused() {
        let base = Path::new("/container");
        assert!(ImportHelper::parse(base, "/etc").is_none());
        assert!(ImportHelper::parse(base, "../../etc").is_none());
        assert!(ImportHelper::parse(base, "").is_none());
    }

    #[test]
    fn listing_skips_hidden_files_and_directories() {
        let base = TempDir::new().unwrap();
        let helper = ImportHelper::generate(base.path());
        fs::create_dir_all(helper.import_dir().join("nested")).unwrap();
        fs::write(helper.import_dir().join("b.txt"), "b").unwrap();
        fs::write(helper.import_dir().join("a.pdf"), "a").unwrap();
        fs::write(helper.import_dir().join(".DS_Store"), "").unwrap();

        let names: Vec<String> = helper
            .imported_file_paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn missing_session_lists_nothing() {
        let base = TempDir::new().unwrap();
        assert!(ImportHelper::generate(base.path()).imported_file_paths().is_empty());
    }

    #[tokio::test]
    async fn move_files_into_session() {
        let base = TempDir::new().unwrap();
        let source = base.path().join("photo.jpg");
        fs::write(&source, "jpeg").unwrap();

        let helper = ImportHelper::generate(base.path());
        helper
            .move_files_to_import_directory(&[source.clone()])
            .await
            .unwrap();

        assert!(!source.exists());
        assert_eq!(
            helper.imported_file_paths(),
            vec![helper.import_dir().join("photo.jpg")]
        );
    }

    #[tokio::test]
    async fn copy_fallback_moves_content() {
        let base = TempDir::new().unwrap();
        let source = base.path().join("doc.pdf");
        let target = base.path().join("moved.pdf");
        fs::write(&source, "pdf").unwrap();

        copy_then_remove(&source, &target).await.unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "pdf");
    }

    #[tokio::test]
    async fn moving_a_missing_file_fails() {
        let base = TempDir::new().unwrap();
        let err = move_file(&base.path().join("absent"), &base.path().join("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn imported_file_guesses_mime_and_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();

        let file = ImportedFile::from_path(path);
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 5);
        assert!(Uuid::parse_str(&file.reference).is_ok());
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let file = ImportedFile::from_path(PathBuf::from("/nowhere/blob.zzzunknown"));
        assert_eq!(file.mime_type, FALLBACK_MIME_TYPE);
        assert_eq!(file.size, 0);
    }

    #[test]
    fn serializes_for_the_web_app() {
        let file = ImportedFile {
            reference: "r1".to_string(),
            name: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            size: 3,
            path: PathBuf::from("/tmp/a.png"),
        };
        assert_eq!(
            serde_json::to_value(&file).unwrap(),
            serde_json::json!({"ref": "r1", "name": "a.png", "mimeType": "image/png", "size": 3})
        );
    }
}
