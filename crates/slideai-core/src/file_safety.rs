//! Upload safety checks.
//!
//! Two layers run before any byte reaches storage:
//! 1. Executable signatures and blocked extensions are always rejected.
//! 2. Magic byte detection (via `infer`) must not contradict the service's
//!    accepted kind. Payloads with no recognizable signature pass through.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::ServiceType;

/// Longest display name kept for a stored file.
pub const MAX_FILENAME_LEN: usize = 255;

/// Magic byte signatures for executable files.
const EXECUTABLE_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "so", "dylib", "jar", "class", "apk", "dmg",
        "pptm", "potm", "ppam", "lnk", "hta",
    ]
    .into_iter()
    .collect()
});

/// Outcome of an upload safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub block_reason: Option<String>,
    pub detected_type: Option<String>,
}

impl ValidationResult {
    pub fn allowed(detected: Option<String>) -> Self {
        Self {
            allowed: true,
            block_reason: None,
            detected_type: detected,
        }
    }

    pub fn blocked(reason: impl Into<String>, detected: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
            detected_type: Some(detected.into()),
        }
    }
}

/// Check an upload's name and leading bytes against a service.
pub fn validate_upload(filename: &str, head: &[u8], service: ServiceType) -> ValidationResult {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        if BLOCKED_EXTENSIONS.contains(ext.as_str()) {
            return ValidationResult::blocked(
                format!("File extension .{} is not allowed", ext),
                format!("blocked_extension:{}", ext),
            );
        }
    }

    for (name, magic) in EXECUTABLE_SIGNATURES {
        if head.starts_with(magic) {
            return ValidationResult::blocked(
                format!("Executable file detected: {}", name),
                format!("executable:{}", name.to_lowercase().replace(' ', "_")),
            );
        }
    }

    match infer::get(head) {
        Some(kind) if !service.accepts_content_type(kind.mime_type()) => ValidationResult::blocked(
            format!(
                "Content looks like {} but only {} are accepted",
                kind.mime_type(),
                service.accepted_kind()
            ),
            kind.mime_type(),
        ),
        Some(kind) => ValidationResult::allowed(Some(kind.mime_type().to_string())),
        None => ValidationResult::allowed(None),
    }
}

/// Reduce a client-supplied name to a safe display name.
///
/// Path components are dropped, reserved characters replaced and the result
/// capped at [`MAX_FILENAME_LEN`] characters with the extension preserved.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim().trim_start_matches('.');
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    let total = sanitized.chars().count();
    if total <= MAX_FILENAME_LEN {
        return sanitized.to_string();
    }

    match sanitized.rfind('.') {
        Some(dot) if sanitized[dot..].chars().count() < MAX_FILENAME_LEN => {
            let ext = &sanitized[dot..];
            let keep = MAX_FILENAME_LEN - ext.chars().count();
            let stem: String = sanitized[..dot].chars().take(keep).collect();
            format!("{}{}", stem, ext)
        }
        _ => sanitized.chars().take(MAX_FILENAME_LEN).collect(),
    }
}
