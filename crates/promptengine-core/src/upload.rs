use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::error::ApiError;

/// Extensions the knowledge base accepts, with the MIME type sent for each
const ACCEPTED: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
];

/// A file read into memory, ready for the multipart body
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Transient message shown after an upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBanner {
    Success(String),
    Error(String),
}

impl UploadBanner {
    pub fn text(&self) -> &str {
        match self {
            UploadBanner::Success(text) | UploadBanner::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, UploadBanner::Error(_))
    }
}

pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    ACCEPTED
        .iter()
        .find(|(accepted, _)| *accepted == ext)
        .map(|(_, mime)| *mime)
}

/// Split dropped paths into (accepted, rejected)
pub fn partition_files(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths.into_iter().partition(|p| mime_for(p).is_some())
}

/// Parse a path list typed or pasted into the drop field.
///
/// Terminals paste dropped files as whitespace-separated, optionally quoted
/// paths; backslash-escaped spaces are kept.
pub fn parse_path_list(input: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', None) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (c, None) if c.is_whitespace() => {
                if !current.is_empty() {
                    paths.push(PathBuf::from(std::mem::take(&mut current)));
                }
            }
            (c, _) => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(PathBuf::from(current));
    }
    paths
}

pub async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>, ApiError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let mime = mime_for(path).ok_or_else(|| {
            ApiError::Validation(format!("Unsupported file type: {}", path.display()))
        })?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        files.push(UploadFile {
            file_name,
            mime,
            bytes,
        });
    }
    Ok(files)
}

/// Upload every accepted path in one request and describe the outcome.
///
/// Returns `None` when nothing was accepted (no request is made).
pub async fn upload_paths(client: &ApiClient, paths: Vec<PathBuf>) -> Option<UploadBanner> {
    let (accepted, rejected) = partition_files(paths);
    if !rejected.is_empty() {
        tracing::debug!("Skipping {} unsupported file(s)", rejected.len());
    }
    if accepted.is_empty() {
        return None;
    }

    let files = match read_files(&accepted).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!("Could not read files for upload: {}", e);
            return Some(UploadBanner::Error("Error uploading file.".to_string()));
        }
    };

    Some(banner_for(files.len(), client.ingest_files(&files).await))
}

/// Source label recorded for notes typed into the knowledge screen
pub const NOTE_SOURCE: &str = "terminal-note";

/// Send a plain-text note to the knowledge base. `None` for blank text.
pub async fn upload_note(client: &ApiClient, text: &str) -> Option<UploadBanner> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let banner = match client.ingest_text(text, NOTE_SOURCE).await {
        Ok(response) if response.error => UploadBanner::Error(
            response.message.unwrap_or_else(|| "Upload failed".to_string()),
        ),
        Ok(_) => UploadBanner::Success("Note added to the knowledge base!".to_string()),
        Err(e) => banner_for(1, Err::<(), _>(e)),
    };
    Some(banner)
}

pub fn banner_for<T>(count: usize, result: Result<T, ApiError>) -> UploadBanner {
    match result {
        Ok(_) => UploadBanner::Success(format!("Successfully uploaded {} file(s)!", count)),
        Err(ApiError::Status { message, .. }) | Err(ApiError::Rejected(message)) => {
            if message.is_empty() {
                UploadBanner::Error("Upload failed".to_string())
            } else {
                UploadBanner::Error(message)
            }
        }
        Err(ApiError::Unauthorized) => UploadBanner::Error(ApiError::Unauthorized.user_message()),
        Err(e) => {
            tracing::warn!("Upload failed: {}", e);
            UploadBanner::Error("Error uploading file.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn accepts_images_and_pdf_case_insensitively() {
        assert_eq!(mime_for(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_for(Path::new("b.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for(Path::new("c.webp")), Some("image/webp"));
        assert_eq!(mime_for(Path::new("d.pdf")), Some("application/pdf"));
        assert_eq!(mime_for(Path::new("e.docx")), None);
        assert_eq!(mime_for(Path::new("noext")), None);
    }

    #[test]
    fn partition_keeps_order() {
        let (ok, bad) = partition_files(vec![
            PathBuf::from("1.pdf"),
            PathBuf::from("2.txt"),
            PathBuf::from("3.jpg"),
        ]);
        assert_eq!(ok, vec![PathBuf::from("1.pdf"), PathBuf::from("3.jpg")]);
        assert_eq!(bad, vec![PathBuf::from("2.txt")]);
    }

    #[test]
    fn parses_quoted_and_escaped_paths() {
        let paths = parse_path_list(r#"'/tmp/my scan.png' /tmp/a\ b.pdf  "/x/y.webp""#);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tmp/my scan.png"),
                PathBuf::from("/tmp/a b.pdf"),
                PathBuf::from("/x/y.webp"),
            ]
        );
    }

    #[test]
    fn banners() {
        assert_eq!(
            banner_for(2, Ok::<(), ApiError>(())),
            UploadBanner::Success("Successfully uploaded 2 file(s)!".to_string())
        );
        assert_eq!(
            banner_for::<()>(1, Err(ApiError::Rejected("Unsupported file type".to_string()))),
            UploadBanner::Error("Unsupported file type".to_string())
        );
        assert_eq!(
            banner_for::<()>(
                1,
                Err(ApiError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: String::new()
                })
            ),
            UploadBanner::Error("Upload failed".to_string())
        );
        assert_eq!(
            banner_for::<()>(1, Err(ApiError::Decode("eof".to_string()))),
            UploadBanner::Error("Error uploading file.".to_string())
        );
    }

    #[tokio::test]
    async fn nothing_accepted_means_no_request() {
        // Unroutable base URL: reaching the network would yield an error banner
        let client = ApiClient::new("http://127.0.0.1:9", crate::session::Session::in_memory());
        let banner = upload_paths(&client, vec![PathBuf::from("notes.txt")]).await;
        assert_eq!(banner, None);
    }

    #[tokio::test]
    async fn blank_note_is_not_sent() {
        let client = ApiClient::new("http://127.0.0.1:9", crate::session::Session::in_memory());
        assert_eq!(upload_note(&client, "  \n ").await, None);
    }
}
