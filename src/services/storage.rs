use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};

const VIDEO_DIR: &str = "videos";
const THEORY_DIR: &str = "theory";
pub const MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// Disk-backed storage for lesson videos and theory submissions. Every stored
/// file gets a random name so uploads never collide or overwrite.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.root.join(VIDEO_DIR)).await?;
        fs::create_dir_all(self.root.join(THEORY_DIR)).await
    }

    /// Stores an uploaded lesson video and returns its generated file name.
    pub async fn save_video(&self, original_name: &str, data: &[u8]) -> ServiceResult<String> {
        check_size(data.len())?;
        match sniff_mime(data) {
            Some(kind) if kind.starts_with("video/") => {}
            _ => return Err(ServiceError::UnsupportedMedia("Only video files allowed".to_string())),
        }

        let file_name = unique_file_name(original_name);
        let dir = self.root.join(VIDEO_DIR);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&file_name), data).await?;
        Ok(file_name)
    }

    pub fn video_path(&self, file_name: &str) -> ServiceResult<PathBuf> {
        if !is_safe_file_name(file_name) {
            return Err(ServiceError::NotFound("File not found".to_string()));
        }
        Ok(self.root.join(VIDEO_DIR).join(file_name))
    }

    /// Stores a theory answer under `theory/<task>/<student>/` and returns the
    /// full path written.
    pub async fn save_theory(
        &self,
        task_id: i32,
        student_id: i32,
        original_name: &str,
        data: &[u8],
    ) -> ServiceResult<PathBuf> {
        check_size(data.len())?;
        if data.is_empty() {
            return Err(ServiceError::InvalidState("File is empty".to_string()));
        }

        let dir = self
            .root
            .join(THEORY_DIR)
            .join(task_id.to_string())
            .join(student_id.to_string());
        fs::create_dir_all(&dir).await?;

        let path = dir.join(unique_file_name(original_name));
        fs::write(&path, data).await?;
        Ok(path)
    }
}

fn check_size(len: usize) -> ServiceResult<()> {
    if len > MAX_UPLOAD_BYTES {
        return Err(ServiceError::TooLarge("File too large".to_string()));
    }
    Ok(())
}

/// Random UUID name that keeps the original extension, if any.
pub fn unique_file_name(original_name: &str) -> String {
    match extension_of(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_safe_file_name(file_name: &str) -> bool {
    !file_name.is_empty()
        && file_name != "."
        && file_name != ".."
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}

pub fn content_type_for(path: &Path) -> mime::Mime {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let known = match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("pdf") => return mime::APPLICATION_PDF,
        Some("txt") => return mime::TEXT_PLAIN_UTF_8,
        Some("png") => return mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => return mime::IMAGE_JPEG,
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };
    known.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal ISO-BMFF header: size, "ftyp", brand "isom".
    const MP4_HEADER: &[u8] = &[
        0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
        0x00, b'i', b's', b'o', b'm', b'm', b'p', b'4', b'2',
    ];

    fn temp_storage(name: &str) -> FileStorage {
        let root = std::env::temp_dir()
            .join("elearning-storage-tests")
            .join(format!("{}-{}", name, Uuid::new_v4()));
        FileStorage::new(root)
    }

    #[test]
    fn test_unique_name_keeps_extension() {
        let name = unique_file_name("Essay Final.PDF");
        assert!(name.ends_with(".pdf"));
        assert_ne!(unique_file_name("a.pdf"), unique_file_name("a.pdf"));
        assert!(!unique_file_name("noext").contains('.'));
        assert!(!unique_file_name("../../etc/passwd").contains('/'));
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("0b7e-4f.mp4"));
        assert!(!is_safe_file_name("../secret"));
        assert!(!is_safe_file_name("a/b.mp4"));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("x.MP4")).as_ref(), "video/mp4");
        assert_eq!(content_type_for(Path::new("x.pdf")), mime::APPLICATION_PDF);
        assert_eq!(content_type_for(Path::new("x")), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff_mime(MP4_HEADER), Some("video/mp4"));
        assert_eq!(sniff_mime(b"plain text"), None);
    }

    #[tokio::test]
    async fn test_save_video_rejects_non_video() {
        let storage = temp_storage("reject");
        match storage.save_video("notes.mp4", b"plain text").await {
            Err(ServiceError::UnsupportedMedia(msg)) => assert_eq!(msg, "Only video files allowed"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_size_limit() {
        assert!(check_size(MAX_UPLOAD_BYTES).is_ok());
        match check_size(MAX_UPLOAD_BYTES + 1) {
            Err(ServiceError::TooLarge(msg)) => assert_eq!(msg, "File too large"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_video_and_resolve() {
        let storage = temp_storage("video");
        let name = storage.save_video("intro.mp4", MP4_HEADER).await.unwrap();
        let path = storage.video_path(&name).unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), MP4_HEADER);
        assert!(storage.video_path("../x").is_err());
    }

    #[tokio::test]
    async fn test_save_theory_layout() {
        let storage = temp_storage("theory");
        let path = storage.save_theory(7, 3, "answer.docx", b"hello").await.unwrap();
        assert!(path.to_string_lossy().contains("theory/7/3/"));
        assert!(path.to_string_lossy().ends_with(".docx"));
        assert!(storage.save_theory(7, 3, "empty.txt", b"").await.is_err());
    }
}
