//! 台帳への行書き込み
//!
//! 挿入時は直上の行からスタイルを深いコピーで引き継ぎ、数式列は
//! テンプレート行の数式を行番号を書き換えて複製する。数式には
//! 必ずキャッシュ値を添える（再計算しないビューアでも正しく表示
//! させるため）。statusとdays to expireの2列は数式+キャッシュ値
//! のみで、リテラル値を書いてはいけない。

use crate::analyzer::ExtractionRecord;
use crate::error::{CertAiError, Result};
use crate::export::locator::SheetLayout;
use crate::export::placement::Placement;
use crate::export::sanitizer::shift_formula_rows;
use crate::normalizer::dates::{self, NO_DATE_TEXT};
use chrono::Local;
use umya_spreadsheet::{
    HorizontalAlignmentValues, NumberingFormat, Spreadsheet, Worksheet,
};

/// 更新ログのシート名（存在しない場合は作らない）
const UPDATE_LOG_SHEET: &str = "Update Log";
/// 更新ログの空行探索の上限
const LOG_SCAN_LIMIT: u32 = 100_000;
/// 適用範囲記号の文字色（赤）
const SCOPE_FONT_ARGB: &str = "FFFF0000";
/// 更新ログに残す処理元の表記
const ENGINE_NOTE: &str = "cert-ai automated import";

fn formatted(sheet: &Worksheet, col: u32, row: u32) -> String {
    sheet.get_formatted_value((col, row)).trim().to_string()
}

/// 台帳の期限セルに書く文字列（空は必ず "No Date"）
fn expiry_cell_text(record: &ExtractionRecord) -> String {
    let effective = record.effective_expiry();
    if effective.is_empty() {
        NO_DATE_TEXT.to_string()
    } else {
        effective
    }
}

/// 数式列のキャッシュ値（status列）
fn status_cache_text(record: &ExtractionRecord) -> String {
    dates::status_today(&record.effective_expiry())
        .as_cell_text()
        .to_string()
}

/// 数式列のキャッシュ値（days to expire列）
fn days_cache_text(record: &ExtractionRecord) -> String {
    let today = Local::now().date_naive();
    match dates::days_to_expire(&record.effective_expiry(), today) {
        Some(days) => days.to_string(),
        None => NO_DATE_TEXT.to_string(),
    }
}

/// days to expire列に実数式を持つ直近のテンプレート行を上方向に探す
fn find_template_row(sheet: &Worksheet, layout: &SheetLayout, below: u32) -> Option<u32> {
    let mut row = below;
    while row > layout.header_row {
        if let Some(cell) = sheet.get_cell((layout.columns.days_to_expire, row)) {
            if !cell.get_formula().is_empty() {
                return Some(row);
            }
        }
        row -= 1;
    }
    None
}

/// 中央寄せする列か（日付・ステータス系）
fn is_centered_column(layout: &SheetLayout, col: u32) -> bool {
    let c = &layout.columns;
    col == c.status
        || col == c.issued
        || col == c.expiry
        || col == c.days_to_expire
        || col == c.request_sent
        || col == c.received
}

/// 新しい行を挿入して1レコードを書き込む
///
/// write_identityは新ブロック先頭行のみtrue。既存ブロックへの追記や
/// 同一バッチ内の同サプライヤー2行目以降では口座・名前・国を
/// 明示的な空文字にする（ブロック表示ルール）。
pub fn insert_record_row(
    book: &mut Spreadsheet,
    layout: &SheetLayout,
    placement: Placement,
    record: &ExtractionRecord,
    write_identity: bool,
) -> Result<()> {
    let row = placement.row;
    book.insert_new_row(&layout.sheet_name, &row, &1);

    let sheet = book
        .get_sheet_by_name_mut(&layout.sheet_name)
        .ok_or_else(|| {
            CertAiError::ExcelWrite(format!("シートが見つかりません: {}", layout.sheet_name))
        })?;

    let highest_col = sheet.get_highest_column().max(layout.columns.comments);

    // 直上の行からスタイルを引き継ぐ（参照共有を避けるため値コピー）
    if row > layout.header_row + 1 {
        for col in 1..=highest_col {
            let style = sheet.get_cell((col, row - 1)).map(|c| c.get_style().clone());
            if let Some(style) = style {
                sheet.get_cell_mut((col, row)).set_style(style);
            }
        }
    }

    // 数式列の複製: テンプレート行の数式を新行の行番号へ書き換える
    if let Some(template_row) = find_template_row(sheet, layout, row - 1) {
        let offset = row as i64 - template_row as i64;
        for col in 1..=highest_col {
            let formula = sheet
                .get_cell((col, template_row))
                .map(|c| c.get_formula().to_string())
                .unwrap_or_default();
            if formula.is_empty() {
                continue;
            }
            let body = formula.strip_prefix('=').unwrap_or(&formula);
            let shifted = shift_formula_rows(body, offset);

            let cell = sheet.get_cell_mut((col, row));
            cell.set_formula(shifted);
            // 数式列のキャッシュ値はレコードの日付から独立に計算する
            // （set_valueは数式を消すため、キャッシュ専用のsetterを使う）
            if col == layout.columns.status {
                cell.set_formula_result_default(status_cache_text(record));
            } else if col == layout.columns.days_to_expire {
                cell.set_formula_result_default(days_cache_text(record));
            }
        }
    }

    // 業務列の書き込み（statusとdays to expireは数式のみ）
    let columns = layout.columns.clone();
    if write_identity {
        sheet
            .get_cell_mut((columns.account, row))
            .set_value(record.matched_account.clone().unwrap_or_default());
        sheet
            .get_cell_mut((columns.name, row))
            .set_value(record.supplier_name.clone());
        sheet
            .get_cell_mut((columns.country, row))
            .set_value(record.country.clone());
    } else {
        // ブロック表示ルール: 先頭行以外は明示的に空文字
        sheet.get_cell_mut((columns.account, row)).set_value("");
        sheet.get_cell_mut((columns.name, row)).set_value("");
        sheet.get_cell_mut((columns.country, row)).set_value("");
    }

    sheet
        .get_cell_mut((columns.scope, row))
        .set_value(record.scope.clone());
    sheet
        .get_cell_mut((columns.measure, row))
        .set_value(record.measure.clone());
    sheet
        .get_cell_mut((columns.certification, row))
        .set_value(record.certification.clone());
    sheet
        .get_cell_mut((columns.product_category, row))
        .set_value(record.product_category.clone());
    sheet
        .get_cell_mut((columns.issued, row))
        .set_value(record.issue_date.clone());
    sheet
        .get_cell_mut((columns.expiry, row))
        .set_value(expiry_cell_text(record));
    sheet
        .get_cell_mut((columns.comments, row))
        .set_value(record.file_name.clone());

    // 適用範囲記号は文字列書式を強制する（"+" や "!" が数式演算子として
    // 誤解釈されないように）。赤字で視覚的にも目立たせる
    {
        let style = sheet.get_style_mut((columns.scope, row));
        style
            .get_number_format_mut()
            .set_format_code(NumberingFormat::FORMAT_TEXT);
        style
            .get_font_mut()
            .get_color_mut()
            .set_argb(SCOPE_FONT_ARGB);
    }

    // 列ごとの寄せ（日付・ステータス系は中央）
    for col in 1..=highest_col {
        let horizontal = if is_centered_column(layout, col) {
            HorizontalAlignmentValues::Center
        } else {
            HorizontalAlignmentValues::Left
        };
        sheet
            .get_style_mut((col, row))
            .get_alignment_mut()
            .set_horizontal(horizontal);
    }

    Ok(())
}

/// 既存行の更新（同一証明書の再アップロード）
///
/// 日付・適用範囲・コメントだけを触る。コメントはファイル名が
/// 未記録の場合のみ追記し、上書きはしない（再アップロードのたびに
/// 同じファイル名が増殖しないように）。
pub fn update_existing_row(
    sheet: &mut Worksheet,
    layout: &SheetLayout,
    row: u32,
    record: &ExtractionRecord,
) {
    let columns = layout.columns.clone();

    if !record.issue_date.trim().is_empty() {
        sheet
            .get_cell_mut((columns.issued, row))
            .set_value(record.issue_date.clone());
    }
    sheet
        .get_cell_mut((columns.expiry, row))
        .set_value(expiry_cell_text(record));

    if !record.scope.trim().is_empty() {
        sheet
            .get_cell_mut((columns.scope, row))
            .set_value(record.scope.clone());
    }

    let file_name = record.file_name.trim();
    if !file_name.is_empty() {
        let existing = formatted(sheet, columns.comments, row);
        if !existing.contains(file_name) {
            let combined = if existing.is_empty() {
                file_name.to_string()
            } else {
                format!("{}; {}", existing, file_name)
            };
            sheet
                .get_cell_mut((columns.comments, row))
                .set_value(combined);
        }
    }

    // 数式列のキャッシュ値を新しい日付で更新する（数式本体は触らない）
    for (col, cache) in [
        (columns.status, status_cache_text(record)),
        (columns.days_to_expire, days_cache_text(record)),
    ] {
        let has_formula = sheet
            .get_cell((col, row))
            .map(|c| !c.get_formula().is_empty())
            .unwrap_or(false);
        if has_formula {
            sheet
                .get_cell_mut((col, row))
                .set_formula_result_default(cache);
        }
    }
}

/// 更新ログへのサマリ行追記
///
/// "Update Log" シートがなければ何もしない（作成はしない）。
/// 最終行メタデータは書式だけの行で狂うため信用せず、2行目から
/// 先頭列が空になる行を上限付きで前方走査する。
pub fn append_update_log(
    book: &mut Spreadsheet,
    account: &str,
    supplier_name: &str,
    summary: &str,
) {
    let Some(sheet) = book.get_sheet_by_name_mut(UPDATE_LOG_SHEET) else {
        return;
    };

    let mut target = None;
    for row in 2..=LOG_SCAN_LIMIT {
        if sheet.get_formatted_value((1, row)).trim().is_empty() {
            target = Some(row);
            break;
        }
    }
    let Some(row) = target else {
        return;
    };

    let timestamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
    sheet.get_cell_mut((1, row)).set_value(timestamp);
    sheet.get_cell_mut((2, row)).set_value(account);
    sheet.get_cell_mut((3, row)).set_value(supplier_name);
    sheet.get_cell_mut((4, row)).set_value(summary);
    sheet.get_cell_mut((5, row)).set_value(ENGINE_NOTE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::locator::ColumnMap;

    fn test_layout() -> SheetLayout {
        SheetLayout {
            sheet_name: "Certs 2025".to_string(),
            header_row: 3,
            columns: ColumnMap::default_layout(),
        }
    }

    fn new_book() -> Spreadsheet {
        let mut book = umya_spreadsheet::new_file();
        book.get_sheet_mut(&0)
            .unwrap()
            .set_name("Certs 2025");
        book
    }

    fn seed_supplier_row(book: &mut Spreadsheet, layout: &SheetLayout, row: u32) {
        let sheet = book.get_sheet_by_name_mut("Certs 2025").unwrap();
        sheet
            .get_cell_mut((layout.columns.account, row))
            .set_value("GLOB01");
        sheet
            .get_cell_mut((layout.columns.name, row))
            .set_value("Global Organics Ltd");
        sheet
            .get_cell_mut((layout.columns.country, row))
            .set_value("Netherlands");
        sheet
            .get_cell_mut((layout.columns.certification, row))
            .set_value("ISO 22000");
        {
            let cell = sheet.get_cell_mut((layout.columns.status, row));
            cell.set_formula(format!(
                "IF(J{row}=\"No Date\",\"No Date\",IF(J{row}<TODAY(),\"Expired\",\"Up to date\"))"
            ));
            cell.set_formula_result_default("Up to date");
        }
        {
            let cell = sheet.get_cell_mut((layout.columns.days_to_expire, row));
            cell.set_formula(format!("J{row}-TODAY()"));
            cell.set_formula_result_default("100");
        }
    }

    fn record(supplier: &str, cert: &str) -> ExtractionRecord {
        let mut record = ExtractionRecord {
            supplier_name: supplier.to_string(),
            certification: cert.to_string(),
            issue_date: "2024-01-15".to_string(),
            file_name: "cert.pdf".to_string(),
            matched_account: Some("GLOB01".to_string()),
            ..Default::default()
        };
        record.finalize();
        record
    }

    // ==================== 挿入 ====================

    #[test]
    fn test_insert_into_block_leaves_identity_blank() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let placement = Placement {
            row: 5,
            in_existing_block: true,
        };
        insert_record_row(&mut book, &layout, placement, &record("Global Organics", "BRC Food"), false)
            .unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        assert_eq!(sheet.get_formatted_value((layout.columns.account, 5)), "");
        assert_eq!(sheet.get_formatted_value((layout.columns.name, 5)), "");
        assert_eq!(sheet.get_formatted_value((layout.columns.country, 5)), "");
        assert_eq!(
            sheet.get_formatted_value((layout.columns.certification, 5)),
            "BRC Food"
        );
    }

    #[test]
    fn test_insert_new_block_writes_identity() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let mut rec = record("New Supplier Co", "ISO 9001");
        rec.matched_account = Some("NEWS01".to_string());
        rec.country = "Germany".to_string();

        let placement = Placement {
            row: 6,
            in_existing_block: false,
        };
        insert_record_row(&mut book, &layout, placement, &rec, true).unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        assert_eq!(sheet.get_formatted_value((layout.columns.account, 6)), "NEWS01");
        assert_eq!(
            sheet.get_formatted_value((layout.columns.name, 6)),
            "New Supplier Co"
        );
        assert_eq!(sheet.get_formatted_value((layout.columns.country, 6)), "Germany");
    }

    #[test]
    fn test_insert_clones_formulas_with_shifted_rows() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let placement = Placement {
            row: 5,
            in_existing_block: true,
        };
        insert_record_row(&mut book, &layout, placement, &record("Global Organics", "BRC Food"), false)
            .unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        let days_formula = sheet
            .get_cell((layout.columns.days_to_expire, 5))
            .map(|c| c.get_formula().to_string())
            .unwrap_or_default();
        assert_eq!(days_formula, "J5-TODAY()");

        let status_formula = sheet
            .get_cell((layout.columns.status, 5))
            .map(|c| c.get_formula().to_string())
            .unwrap_or_default();
        assert!(status_formula.contains("J5"));
        assert!(!status_formula.contains("J4"));
    }

    #[test]
    fn test_insert_writes_formula_cache_not_literal() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        // 発行日2024-01-15・期限なし → 3年ルールで2027-01-15
        let placement = Placement {
            row: 5,
            in_existing_block: true,
        };
        insert_record_row(&mut book, &layout, placement, &record("Global Organics", "BRC Food"), false)
            .unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        // ステータス列は数式を持つ（リテラルだけのセルではない）
        let cell = sheet.get_cell((layout.columns.status, 5)).unwrap();
        assert!(!cell.get_formula().is_empty());
        // 期限列には有効期限が入る
        assert_eq!(
            sheet.get_formatted_value((layout.columns.expiry, 5)),
            "2027-01-15"
        );
    }

    #[test]
    fn test_insert_no_date_rendering() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let mut rec = record("Global Organics", "BRC Food");
        rec.issue_date = String::new();
        rec.expiry_date = String::new();

        let placement = Placement {
            row: 5,
            in_existing_block: true,
        };
        insert_record_row(&mut book, &layout, placement, &rec, false).unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        assert_eq!(
            sheet.get_formatted_value((layout.columns.expiry, 5)),
            NO_DATE_TEXT
        );
    }

    #[test]
    fn test_insert_scope_forced_to_text_format() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let mut rec = record("Global Organics", "BRC Food");
        rec.scope = "+".to_string();

        let placement = Placement {
            row: 5,
            in_existing_block: true,
        };
        insert_record_row(&mut book, &layout, placement, &rec, false).unwrap();

        let sheet = book.get_sheet_by_name("Certs 2025").unwrap();
        assert_eq!(sheet.get_formatted_value((layout.columns.scope, 5)), "+");
        let cell = sheet.get_cell((layout.columns.scope, 5)).unwrap();
        assert_eq!(
            cell.get_style().get_number_format().unwrap().get_format_code(),
            NumberingFormat::FORMAT_TEXT
        );
    }

    // ==================== 更新 ====================

    #[test]
    fn test_update_appends_comment_once() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);
        {
            let sheet = book.get_sheet_by_name_mut("Certs 2025").unwrap();
            sheet
                .get_cell_mut((layout.columns.comments, 4))
                .set_value("old_cert.pdf");
        }

        let rec = record("Global Organics", "ISO 22000");
        let sheet = book.get_sheet_by_name_mut("Certs 2025").unwrap();
        update_existing_row(sheet, &layout, 4, &rec);
        assert_eq!(
            sheet.get_formatted_value((layout.columns.comments, 4)),
            "old_cert.pdf; cert.pdf"
        );

        // 2回目の更新では増えない
        update_existing_row(sheet, &layout, 4, &rec);
        assert_eq!(
            sheet.get_formatted_value((layout.columns.comments, 4)),
            "old_cert.pdf; cert.pdf"
        );
    }

    #[test]
    fn test_update_refreshes_formula_cache() {
        let mut book = new_book();
        let layout = test_layout();
        seed_supplier_row(&mut book, &layout, 4);

        let mut rec = record("Global Organics", "ISO 22000");
        rec.expiry_date = "2099-12-31".to_string();
        rec.finalize();

        let sheet = book.get_sheet_by_name_mut("Certs 2025").unwrap();
        update_existing_row(sheet, &layout, 4, &rec);

        assert_eq!(
            sheet.get_formatted_value((layout.columns.expiry, 4)),
            "2099-12-31"
        );
        // 数式は残ったままキャッシュ値だけ更新される
        let cell = sheet.get_cell((layout.columns.status, 4)).unwrap();
        assert!(!cell.get_formula().is_empty());
        assert_eq!(cell.get_value(), "Up to date");
    }

    // ==================== 更新ログ ====================

    #[test]
    fn test_update_log_appended_when_sheet_exists() {
        let mut book = new_book();
        book.new_sheet(UPDATE_LOG_SHEET).unwrap();
        {
            let sheet = book.get_sheet_by_name_mut(UPDATE_LOG_SHEET).unwrap();
            sheet.get_cell_mut((1, 1)).set_value("Timestamp");
            sheet.get_cell_mut((1, 2)).set_value("2025-01-01 09:00");
        }

        append_update_log(&mut book, "GLOB01", "Global Organics Ltd", "2件追加");

        let sheet = book.get_sheet_by_name(UPDATE_LOG_SHEET).unwrap();
        assert_eq!(sheet.get_formatted_value((2, 3)), "GLOB01");
        assert_eq!(sheet.get_formatted_value((3, 3)), "Global Organics Ltd");
        assert_eq!(sheet.get_formatted_value((5, 3)), ENGINE_NOTE);
    }

    #[test]
    fn test_update_log_never_created() {
        let mut book = new_book();
        append_update_log(&mut book, "GLOB01", "Global Organics Ltd", "1件追加");
        assert!(book.get_sheet_by_name(UPDATE_LOG_SHEET).is_none());
    }
}
