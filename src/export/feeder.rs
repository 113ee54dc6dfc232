//! レビュー用フィーダーExcelの生成
//!
//! マスタ台帳本体とは別の、照合・重複除去後のレコード一覧を
//! 人が確認するための単純なフラット出力。手作業のコピペ取り込み用。

use crate::analyzer::ExtractionRecord;
use crate::error::{CertAiError, Result};
use crate::normalizer::dates::NO_DATE_TEXT;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};

const HEADERS: &[&str] = &[
    "Supplier Account",
    "Supplier Name",
    "Original Name",
    "Match Confidence",
    "Country",
    "Scope",
    "Measure",
    "Certification",
    "Product Category",
    "Issue Date",
    "Effective Expiry",
    "Status",
    "File Name",
    "New Supplier",
];

/// フィーダーExcelをバッファに生成
pub fn generate_feeder_buffer(records: &[ExtractionRecord]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Extracted Certificates")
        .map_err(|e| CertAiError::ExcelWrite(format!("シート名設定エラー: {}", e)))?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x2F5597))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);

    let cell_format = Format::new().set_border(FormatBorder::Hair);

    let new_supplier_format = Format::new()
        .set_border(FormatBorder::Hair)
        .set_font_color(Color::RGB(0xC00000))
        .set_bold();

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(|e| CertAiError::ExcelWrite(format!("ヘッダー書き込みエラー: {}", e)))?;
        worksheet
            .set_column_width(col as u16, 18.0)
            .map_err(|e| CertAiError::ExcelWrite(format!("列幅設定エラー: {}", e)))?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        // 新規判定は照合メタデータ基準（口座未採番の登録済み社もある）
        let is_new = record.match_confidence.is_none();
        let format = if is_new {
            &new_supplier_format
        } else {
            &cell_format
        };

        let effective = record.effective_expiry();
        let confidence = record
            .match_confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_default();

        let values: [&str; 14] = [
            record.matched_account.as_deref().unwrap_or(""),
            &record.supplier_name,
            record.original_supplier_name.as_deref().unwrap_or(""),
            &confidence,
            &record.country,
            &record.scope,
            &record.measure,
            &record.certification,
            &record.product_category,
            &record.issue_date,
            if effective.is_empty() {
                NO_DATE_TEXT
            } else {
                &effective
            },
            record.status.as_cell_text(),
            &record.file_name,
            if is_new { "Yes" } else { "" },
        ];

        for (col, value) in values.iter().enumerate() {
            worksheet
                .write_string_with_format(row, col as u16, *value, format)
                .map_err(|e| CertAiError::ExcelWrite(format!("セル書き込みエラー: {}", e)))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| CertAiError::ExcelWrite(format!("Excel保存エラー: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feeder_buffer_not_empty() {
        let mut record = ExtractionRecord {
            supplier_name: "Global Organics Ltd".to_string(),
            certification: "ISO 22000".to_string(),
            issue_date: "2024-01-15".to_string(),
            file_name: "cert.pdf".to_string(),
            matched_account: Some("GLOB01".to_string()),
            match_confidence: Some(0.92),
            ..Default::default()
        };
        record.finalize();

        let buffer = generate_feeder_buffer(&[record]).unwrap();
        // xlsxはZIPコンテナ（PKヘッダー）
        assert!(buffer.len() > 4);
        assert_eq!(&buffer[0..2], b"PK");
    }

    #[test]
    fn test_feeder_buffer_empty_batch() {
        let buffer = generate_feeder_buffer(&[]).unwrap();
        assert_eq!(&buffer[0..2], b"PK");
    }

    #[test]
    fn test_feeder_new_supplier_flag_follows_match_metadata() {
        // 照合済みだが口座未採番 → 新規扱いにしない
        let mut matched_no_account = ExtractionRecord {
            supplier_name: "Global Organics Ltd".to_string(),
            match_confidence: Some(0.88),
            ..Default::default()
        };
        matched_no_account.finalize();

        let mut unmatched = ExtractionRecord {
            supplier_name: "Zenith Quarry Works".to_string(),
            ..Default::default()
        };
        unmatched.finalize();

        let buffer = generate_feeder_buffer(&[matched_no_account, unmatched]).unwrap();
        let book =
            umya_spreadsheet::reader::xlsx::read_reader(std::io::Cursor::new(buffer), true)
                .unwrap();
        let sheet = book.get_sheet_by_name("Extracted Certificates").unwrap();

        // New Supplier列（14列目）
        assert_eq!(sheet.get_formatted_value((14, 2)), "");
        assert_eq!(sheet.get_formatted_value((14, 3)), "Yes");
    }
}
