//! Upload ingest: kind and size checks before anything is stored.
//!
//! The body is never buffered past the service's size cap. A declared size
//! over the cap is rejected without reading, and the body itself is read
//! through a reader limited to one byte past the cap.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use slideai_core::logging::{COMPONENT, SERVICE_TYPE, SIZE_BYTES, SUBSYSTEM};
use slideai_core::{sanitize_filename, validate_upload, Error, Result, ServiceType};

/// Bytes inspected for magic-number sniffing.
const SNIFF_LEN: usize = 8192;

/// An upload as received from the transport.
pub struct IncomingUpload<R> {
    /// Client-supplied file name.
    pub file_name: String,
    /// Client-claimed MIME type.
    pub content_type: Option<String>,
    /// Client-declared length, if the transport provides one.
    pub declared_size: Option<u64>,
    pub body: R,
}

impl<R> IncomingUpload<R> {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, body: R) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            declared_size: None,
            body,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

/// An upload that passed every check and is ready to store.
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    /// Sanitized display name.
    pub file_name: String,
    pub data: Vec<u8>,
    /// MIME type detected from the content, when recognizable.
    pub detected_type: Option<String>,
}

fn size_limit_message(max_bytes: u64) -> String {
    format!("File exceeds the {} MB limit", max_bytes / (1024 * 1024))
}

/// Reject a claimed content type the service does not accept.
pub fn check_content_type(service: ServiceType, content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if service.accepts_content_type(ct) => Ok(()),
        _ => Err(Error::UnsupportedInput(format!(
            "{} only accepts {}",
            service,
            service.accepted_kind()
        ))),
    }
}

/// Read at most `max_bytes`, failing as soon as the body is longer.
pub async fn read_capped<R>(body: R, max_bytes: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    body.take(max_bytes.saturating_add(1))
        .read_to_end(&mut data)
        .await?;
    if data.len() as u64 > max_bytes {
        return Err(Error::UnsupportedInput(size_limit_message(max_bytes)));
    }
    Ok(data)
}

/// Run every input check for `service` and buffer the body.
pub async fn ingest<R>(
    upload: IncomingUpload<R>,
    service: ServiceType,
    max_bytes: u64,
) -> Result<AcceptedUpload>
where
    R: AsyncRead + Unpin,
{
    check_content_type(service, upload.content_type.as_deref())?;

    if upload.declared_size.is_some_and(|size| size > max_bytes) {
        return Err(Error::UnsupportedInput(size_limit_message(max_bytes)));
    }

    let data = read_capped(upload.body, max_bytes).await?;
    if data.is_empty() {
        return Err(Error::UnsupportedInput("Uploaded file is empty".to_string()));
    }

    let head = &data[..data.len().min(SNIFF_LEN)];
    let verdict = validate_upload(&upload.file_name, head, service);
    if !verdict.allowed {
        return Err(Error::UnsupportedInput(
            verdict
                .block_reason
                .unwrap_or_else(|| "File rejected".to_string()),
        ));
    }

    debug!(
        { SUBSYSTEM } = "service",
        { COMPONENT } = "upload",
        { SERVICE_TYPE } = %service,
        { SIZE_BYTES } = data.len(),
        detected_type = verdict.detected_type.as_deref().unwrap_or("unknown"),
        "Upload accepted"
    );

    Ok(AcceptedUpload {
        file_name: sanitize_filename(&upload.file_name),
        data,
        detected_type: verdict.detected_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n";

    #[tokio::test]
    async fn test_accepts_pdf_for_slides() {
        let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), PDF);
        let accepted = ingest(upload, ServiceType::PptToVideo, 1024).await.unwrap();
        assert_eq!(accepted.file_name, "deck.pdf");
        assert_eq!(accepted.data, PDF);
        assert_eq!(accepted.detected_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_wrong_content_type_rejected() {
        let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), PDF);
        let err = ingest(upload, ServiceType::VideoAbstract, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedInput(_)));

        let upload = IncomingUpload::new("deck.pdf", None, PDF);
        assert!(ingest(upload, ServiceType::PptToVideo, 1024).await.is_err());
    }

    #[tokio::test]
    async fn test_declared_oversize_rejected_without_reading() {
        let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), PDF)
            .with_declared_size(10 * 1024 * 1024);
        let err = ingest(upload, ServiceType::PptToVideo, 1024 * 1024)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 MB"));
    }

    #[tokio::test]
    async fn test_body_over_cap_rejected() {
        let body = vec![b'x'; 2048];
        let err = read_capped(body.as_slice(), 1024).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedInput(_)));

        let exact = vec![b'x'; 1024];
        assert_eq!(read_capped(exact.as_slice(), 1024).await.unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_content_contradicting_claim_rejected() {
        let body: &[u8] = b"MZ\x90\x00rest";
        let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), body);
        let err = ingest(upload, ServiceType::PptToVideo, 1024)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Executable"));
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let upload = IncomingUpload::new("deck.pdf", Some("application/pdf"), &b""[..]);
        assert!(ingest(upload, ServiceType::PptToVideo, 1024).await.is_err());
    }

    #[tokio::test]
    async fn test_display_name_sanitized() {
        let upload = IncomingUpload::new("../../etc/deck.pdf", Some("application/pdf"), PDF);
        let accepted = ingest(upload, ServiceType::PptToVideo, 1024).await.unwrap();
        assert_eq!(accepted.file_name, "deck.pdf");
    }
}
