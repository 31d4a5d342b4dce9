//! Content-type sniffing from magic bytes.
//!
//! The sender-declared content type is never trusted; these helpers are the
//! only source of MIME types for relayed media.

use crate::router::MediaCategory;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Plain prefix signatures, checked in order.
const SIGNATURES: &[(&[u8], &str)] = &[
    // Images
    (b"\xFF\xD8", "image/jpeg"),
    (b"\x89PNG", "image/png"),
    (b"GIF8", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"MM\x00\x2A", "image/tiff"),
    (b"II\x2A\x00", "image/tiff"),
    // Video
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"FLV", "video/x-flv"),
    (b"\x00\x00\x01\xBA", "video/mpeg"),
    (b"\x00\x00\x01\xB3", "video/mpeg"),
    (b"\x30\x26\xB2\x75\x8E\x66\xCF\x11", "video/x-ms-wmv"),
    // Audio
    (b"ID3", "audio/mpeg"),
    (b"OggS", "audio/ogg"),
    (b"fLaC", "audio/flac"),
    (b"#!AMR", "audio/amr"),
    (b"MAC ", "audio/x-ape"),
    // Documents
    (b"%PDF", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"PK\x05\x06", "application/zip"),
    (b"PK\x07\x08", "application/zip"),
    (b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1", "application/vnd.ms-office"),
    (b"{\\rtf", "application/rtf"),
    (b"<?xml", "text/xml"),
    (b"\xEF\xBB\xBF<?xml", "text/xml"),
    (b"<!DOCTYPE html", "text/html"),
    (b"<html", "text/html"),
    (b"BZh", "application/x-bzip2"),
    (b"\x1F\x8B\x08", "application/gzip"),
    (b"Rar!", "application/x-rar-compressed"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
];

/// Detect a MIME type from the leading bytes, falling back to `application/octet-stream`.
pub fn detect_type(data: &[u8]) -> &'static str {
    if data.len() < 4 {
        return OCTET_STREAM;
    }

    if let Some(mime) = container_type(data) {
        return mime;
    }

    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return *mime;
    }

    // MPEG audio frame sync (11 set bits).
    if data[0] == 0xFF && data[1] & 0xE0 == 0xE0 {
        return "audio/mpeg";
    }

    OCTET_STREAM
}

/// RIFF/AIFF/ISO-BMFF containers keep their format tag at a fixed offset.
fn container_type(data: &[u8]) -> Option<&'static str> {
    let tag = data.get(8..12)?;
    match &data[..4] {
        b"RIFF" => match tag {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        },
        b"FORM" if tag == b"AIFF" => Some("audio/aiff"),
        _ if &data[4..8] == b"ftyp" => {
            if tag.starts_with(b"3g") {
                Some("video/3gpp")
            } else if tag == b"M4A " {
                Some("audio/mp4")
            } else {
                Some("video/mp4")
            }
        }
        _ => None,
    }
}

/// File extension (without dot) for a MIME type.
///
/// A few types get their conventional extension; the rest come from the
/// `mime_guess` registry, then from the subtype itself, then `bin`.
pub fn extension_for(mime_type: &str) -> String {
    let mime = essence(mime_type);
    if let Some(ext) = preferred_extension(&mime) {
        return ext.to_string();
    }
    let bare = bare_subtype(&mime);
    mime_guess::get_mime_extensions_str(&mime)
        .and_then(|exts| exts.iter().find(|e| Some(**e) == bare).or(exts.first()))
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| generic_extension(&mime))
}

fn preferred_extension(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/tiff" => "tiff",
        "image/x-icon" => "ico",
        "video/mpeg" => "mpg",
        "video/x-msvideo" => "avi",
        "video/x-ms-wmv" => "wmv",
        "video/3gpp" => "3gp",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/aiff" => "aiff",
        "audio/x-ms-wma" => "wma",
        "audio/x-ape" => "ape",
        "application/vnd.ms-office" => "doc",
        "text/html" => "html",
        "text/plain" => "txt",
        "application/x-bzip2" => "bz2",
        "application/gzip" => "gz",
        "application/x-rar-compressed" => "rar",
        "application/x-7z-compressed" => "7z",
        "application/octet-stream" => "bin",
        _ => return None,
    };
    Some(ext)
}

/// `svg` for `image/svg+xml`, `ms-excel` for `application/vnd.ms-excel`.
fn bare_subtype(mime: &str) -> Option<&str> {
    let (_, subtype) = mime.split_once('/')?;
    let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
    let subtype = subtype.strip_prefix("vnd.").unwrap_or(subtype);
    subtype.split('+').next()
}

fn generic_extension(mime: &str) -> String {
    let Some((_, subtype)) = mime.split_once('/') else {
        return "bin".to_string();
    };
    let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
    let subtype = subtype.strip_prefix("vnd.").unwrap_or(subtype);
    if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
        subtype.to_string()
    } else {
        "bin".to_string()
    }
}

/// Coarse category for the cloud API; anything not image/video/audio is a document.
pub fn category_for(mime_type: &str) -> MediaCategory {
    let mime = essence(mime_type);
    match mime.split_once('/').map(|(top, _)| top) {
        Some("image") => MediaCategory::Image,
        Some("video") => MediaCategory::Video,
        Some("audio") => MediaCategory::Audio,
        _ => MediaCategory::Document,
    }
}

/// `type/subtype` lowercased, without parameters.
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
