use crate::error::{CertAiError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 取り込み対象の証明書ファイル
#[derive(Debug, Clone)]
pub struct CertificateFile {
    pub path: PathBuf,
    pub file_name: String,
}

const CERTIFICATE_EXTENSIONS: &[&str] = &[
    "pdf", "PDF", "docx", "DOCX", "jpg", "jpeg", "png", "JPG", "JPEG", "PNG",
];

pub fn scan_folder(folder: &Path) -> Result<Vec<CertificateFile>> {
    if !folder.exists() {
        return Err(CertAiError::FolderNotFound(folder.display().to_string()));
    }

    let mut certificates = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy();
            if CERTIFICATE_EXTENSIONS.iter().any(|&e| e == ext_str) {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                certificates.push(CertificateFile {
                    path: path.to_path_buf(),
                    file_name,
                });
            }
        }
    }

    // ファイル名でソート
    certificates.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(certificates)
}

/// Check if a file extension is a supported certificate format
#[cfg(test)]
fn is_certificate_extension(ext: &str) -> bool {
    CERTIFICATE_EXTENSIONS.contains(&ext)
}
