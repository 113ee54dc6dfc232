//! マスタ台帳のシート・ヘッダー検出
//!
//! 台帳のレイアウトは顧客側で微妙に変わるため、固定位置を信用せず
//! ヘッダー文字列の走査で列配置を解決する。見つからない場合のみ
//! 既定レイアウト（ヘッダー行3・15列固定）へフォールバックする。

use crate::error::{CertAiError, Result};
use std::collections::HashMap;
use umya_spreadsheet::Spreadsheet;

/// 優先シート名（この名前があれば無条件で選ぶ）
const PREFERRED_SHEET: &str = "Certs 2025";
/// ヘッダー行を探す範囲（1始まり）
const HEADER_SCAN_ROWS: u32 = 10;
/// ヘッダー列を探す範囲
const HEADER_SCAN_COLS: u32 = 40;
/// フォールバック時のヘッダー行
const DEFAULT_HEADER_ROW: u32 = 3;

/// 台帳の列配置（1始まりの列番号）
///
/// statusとdays_to_expireは数式列。リテラル値を書いてはいけない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub account: u32,
    pub name: u32,
    pub country: u32,
    pub scope: u32,
    pub measure: u32,
    pub certification: u32,
    pub product_category: u32,
    pub status: u32,
    pub issued: u32,
    pub expiry: u32,
    pub days_to_expire: u32,
    pub contact: u32,
    pub request_sent: u32,
    pub received: u32,
    pub comments: u32,
}

impl ColumnMap {
    /// 既定の15列レイアウト
    pub fn default_layout() -> Self {
        Self {
            account: 1,
            name: 2,
            country: 3,
            scope: 4,
            measure: 5,
            certification: 6,
            product_category: 7,
            status: 8,
            issued: 9,
            expiry: 10,
            days_to_expire: 11,
            contact: 12,
            request_sent: 13,
            received: 14,
            comments: 15,
        }
    }
}

/// シート選択とヘッダー解決の結果
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub sheet_name: String,
    pub header_row: u32,
    pub columns: ColumnMap,
}

/// ヘッダーテキストの正規化（小文字化・空白圧縮）
fn normalize_header(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_supplier_header(normalized: &str) -> bool {
    normalized == "supplier name" || normalized == "supplier account"
}

/// シート内でサプライヤーヘッダーを持つ行を探す
fn find_header_row(sheet: &umya_spreadsheet::Worksheet) -> Option<u32> {
    for row in 1..=HEADER_SCAN_ROWS {
        for col in 1..=HEADER_SCAN_COLS {
            let text = sheet.get_formatted_value((col, row));
            if is_supplier_header(&normalize_header(&text)) {
                return Some(row);
            }
        }
    }
    None
}

/// ヘッダー行からの列マップ構築
///
/// 認識できなかった列は既定レイアウトの位置をそのまま使う。
fn resolve_columns(sheet: &umya_spreadsheet::Worksheet, header_row: u32) -> ColumnMap {
    let mut headers: HashMap<String, u32> = HashMap::new();
    for col in 1..=HEADER_SCAN_COLS {
        let text = normalize_header(&sheet.get_formatted_value((col, header_row)));
        if !text.is_empty() {
            headers.entry(text).or_insert(col);
        }
    }

    let lookup = |candidates: &[&str], fallback: u32| -> u32 {
        for candidate in candidates {
            if let Some(&col) = headers.get(*candidate) {
                return col;
            }
        }
        // 完全一致がなければ前方一致で拾う（"date of expiry 2025" など）
        for candidate in candidates {
            if let Some((_, &col)) = headers.iter().find(|(h, _)| h.starts_with(*candidate)) {
                return col;
            }
        }
        fallback
    };

    let defaults = ColumnMap::default_layout();
    ColumnMap {
        account: lookup(&["supplier account", "account"], defaults.account),
        name: lookup(&["supplier name"], defaults.name),
        country: lookup(&["country"], defaults.country),
        scope: lookup(&["scope"], defaults.scope),
        measure: lookup(&["measure", "ec regulation"], defaults.measure),
        certification: lookup(&["certification", "certificate"], defaults.certification),
        product_category: lookup(&["product category"], defaults.product_category),
        status: lookup(&["status"], defaults.status),
        issued: lookup(&["issued", "issue date", "date of issue"], defaults.issued),
        expiry: lookup(&["date of expiry", "expiry date", "expiry"], defaults.expiry),
        days_to_expire: lookup(&["days to expire"], defaults.days_to_expire),
        contact: lookup(&["contact"], defaults.contact),
        request_sent: lookup(&["date request sent", "request sent"], defaults.request_sent),
        received: lookup(&["date received", "received"], defaults.received),
        comments: lookup(&["comments", "comment"], defaults.comments),
    }
}

/// データシートを選択する
///
/// 優先順: "Certs 2025" → サプライヤーヘッダーを持つ最初のシート →
/// "Instructions" 以外の最初のシート → 先頭シート。
fn select_sheet_name(book: &Spreadsheet) -> Result<String> {
    let sheets = book.get_sheet_collection();
    if sheets.is_empty() {
        return Err(CertAiError::MasterStructure(
            "ワークブックにシートがありません".to_string(),
        ));
    }

    if let Some(sheet) = sheets.iter().find(|s| s.get_name() == PREFERRED_SHEET) {
        return Ok(sheet.get_name().to_string());
    }

    if let Some(sheet) = sheets.iter().find(|s| find_header_row(s).is_some()) {
        return Ok(sheet.get_name().to_string());
    }

    if let Some(sheet) = sheets
        .iter()
        .find(|s| !s.get_name().eq_ignore_ascii_case("Instructions"))
    {
        return Ok(sheet.get_name().to_string());
    }

    Ok(sheets[0].get_name().to_string())
}

/// サニタイズ済みワークブックからシートとヘッダー配置を解決する
pub fn locate(book: &Spreadsheet) -> Result<SheetLayout> {
    let sheet_name = select_sheet_name(book)?;
    let sheet = book
        .get_sheet_by_name(&sheet_name)
        .ok_or_else(|| CertAiError::MasterStructure(format!("シートが見つかりません: {}", sheet_name)))?;

    match find_header_row(sheet) {
        Some(header_row) => {
            let columns = resolve_columns(sheet, header_row);
            Ok(SheetLayout {
                sheet_name,
                header_row,
                columns,
            })
        }
        None => Ok(SheetLayout {
            sheet_name,
            header_row: DEFAULT_HEADER_ROW,
            columns: ColumnMap::default_layout(),
        }),
    }
}
