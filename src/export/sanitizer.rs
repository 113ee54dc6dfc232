//! ワークブック修復（サニタイザー）
//!
//! 追記パスに渡す前にZIP/XMLレイヤーで2つの独立した修復を行う:
//!
//! 1. 埋め込み図形の除去 — 図形ファイルだけ消すと参照解決でクラッシュ
//!    するため、ワークシートXML・リレーション・Content-Typesの参照も
//!    まとめて落とす。
//! 2. 共有数式の展開 — 行挿入はクローンセルの行相対計算を壊すため、
//!    マスタもクローンも独立した数式に書き換えて共有機構を消す。
//!
//! どちらもオブジェクトモデルを経由せず、ZIPコンテナ内の対象XMLへの
//! 限定的なテキスト置換で行う。触れない部分のバイトと順序は保存する。

use crate::error::{CertAiError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// 修復内容の報告
#[derive(Debug, Default, Clone, Copy)]
pub struct SanitizeReport {
    pub drawings_removed: usize,
    pub shared_formulas_expanded: usize,
}

lazy_static! {
    /// シートXML内の図形参照要素
    static ref DRAWING_REF_RE: Regex =
        Regex::new(r"<(?:drawing|legacyDrawing|legacyDrawingHF)\b[^>]*/>").unwrap();
    /// 図形タイプのリレーション
    static ref DRAWING_REL_RE: Regex =
        Regex::new(r#"<Relationship\b[^>]*Type="[^"]*(?:/drawing|/vmlDrawing)"[^>]*/>"#).unwrap();
    /// Content-Typesの図形オーバーライド
    static ref DRAWING_OVERRIDE_RE: Regex =
        Regex::new(r#"<Override\b[^>]*PartName="[^"]*(?:/drawings/|vmlDrawing)[^"]*"[^>]*/>"#)
            .unwrap();
    /// vml拡張子のデフォルト宣言
    static ref VML_DEFAULT_RE: Regex =
        Regex::new(r#"<Default\b[^>]*Extension="vml"[^>]*/>"#).unwrap();
    /// セル要素（自己終了含む）。整形済みXMLでは要素が改行をまたぐ
    static ref CELL_RE: Regex =
        Regex::new(r#"(?s)<c\b[^>]*\br="([A-Z]{1,3})(\d+)"[^>]*(?:/>|>.*?</c>)"#).unwrap();
    /// 数式要素（本体あり / 自己終了）
    static ref FORMULA_RE: Regex = Regex::new(r"<f\b([^>]*)>([^<]*)</f>|<f\b([^>]*)/>").unwrap();
    /// 共有数式のsi属性
    static ref SI_RE: Regex = Regex::new(r#"\bsi="(\d+)""#).unwrap();
    /// セル参照トークン（絶対参照の$付きも拾い、置換時に判定する）
    static ref REF_TOKEN_RE: Regex = Regex::new(r"\$?[A-Z]{1,3}\$?\d+").unwrap();
}

/// 図形ファイルか（drawings配下とレガシーVML）
fn is_drawing_part(name: &str) -> bool {
    name.contains("drawings/") || name.contains("vmlDrawing")
}

fn is_worksheet_part(name: &str) -> bool {
    name.starts_with("xl/worksheets/") && name.ends_with(".xml")
}

fn is_rels_part(name: &str) -> bool {
    name.ends_with(".rels")
}

/// 数式内のセル参照トークンの行番号をシフトする
///
/// 行が絶対参照（$付き）のトークンは動かさない。
/// 直前が英数字/'$'、直後が '(' か英数字のトークンは
/// 関数名や長い識別子の一部なので除外する。
pub(crate) fn shift_formula_rows(formula: &str, offset: i64) -> String {
    if offset == 0 {
        return formula.to_string();
    }

    let bytes = formula.as_bytes();
    let mut result = String::with_capacity(formula.len());
    let mut last_end = 0;

    for m in REF_TOKEN_RE.find_iter(formula) {
        let (start, end) = (m.start(), m.end());

        let preceded = start > 0 && {
            let c = bytes[start - 1] as char;
            c.is_ascii_alphanumeric() || c == '$'
        };
        let followed = end < bytes.len() && {
            let c = bytes[end] as char;
            c == '(' || c.is_ascii_alphanumeric()
        };

        result.push_str(&formula[last_end..start]);
        last_end = end;

        let token = m.as_str();
        // 行部分の$（絶対行）は動かさない
        let digits_at = token
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let (head, digits) = token.split_at(digits_at);
        let absolute_row = head.ends_with('$');

        if preceded || followed || absolute_row {
            result.push_str(token);
            continue;
        }

        match digits.parse::<i64>() {
            Ok(row) if row + offset >= 1 => {
                result.push_str(head);
                result.push_str(&(row + offset).to_string());
            }
            _ => result.push_str(token),
        }
    }

    result.push_str(&formula[last_end..]);
    result
}

/// f要素の属性ブロブからsiを引く
fn shared_si(attrs: &str) -> Option<u32> {
    if !attrs.contains(r#"t="shared""#) {
        return None;
    }
    SI_RE.captures(attrs)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// ワークシートXMLの共有数式をすべて独立数式へ展開する
pub(crate) fn expand_shared_formulas(sheet_xml: &str) -> (String, usize) {
    if !sheet_xml.contains(r#"t="shared""#) {
        return (sheet_xml.to_string(), 0);
    }

    // パス1: si → (マスタ行, 数式本体)
    let mut masters: HashMap<u32, (i64, String)> = HashMap::new();
    for cell in CELL_RE.captures_iter(sheet_xml) {
        let row: i64 = match cell.get(2).and_then(|m| m.as_str().parse().ok()) {
            Some(r) => r,
            None => continue,
        };
        let cell_xml = cell.get(0).map(|m| m.as_str()).unwrap_or("");
        for f in FORMULA_RE.captures_iter(cell_xml) {
            if let (Some(attrs), Some(body)) = (f.get(1), f.get(2)) {
                if let Some(si) = shared_si(attrs.as_str()) {
                    masters.entry(si).or_insert((row, body.as_str().to_string()));
                }
            }
        }
    }

    // パス2: マスタ・クローンの両方を独立した<f>へ置換
    let mut expanded = 0usize;
    let result = CELL_RE.replace_all(sheet_xml, |cell: &regex::Captures<'_>| {
        let cell_xml = cell.get(0).map(|m| m.as_str()).unwrap_or("");
        let row: i64 = cell
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);

        FORMULA_RE
            .replace_all(cell_xml, |f: &regex::Captures<'_>| {
                // 本体ありの共有マスタ
                if let (Some(attrs), Some(body)) = (f.get(1), f.get(2)) {
                    if shared_si(attrs.as_str()).is_some() {
                        expanded += 1;
                        return format!("<f>{}</f>", body.as_str());
                    }
                }
                // 自己終了のクローン
                if let Some(attrs) = f.get(3) {
                    if let Some(si) = shared_si(attrs.as_str()) {
                        if let Some((master_row, body)) = masters.get(&si) {
                            expanded += 1;
                            let shifted = shift_formula_rows(body, row - master_row);
                            return format!("<f>{}</f>", shifted);
                        }
                    }
                }
                f.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
            })
            .into_owned()
    });

    (result.into_owned(), expanded)
}

/// ワークブックを修復する
///
/// 図形も共有数式もない場合は入力バイト列をそのまま返す（no-op）。
pub fn sanitize_workbook(bytes: &[u8]) -> Result<(Vec<u8>, SanitizeReport)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CertAiError::MasterParse(e.to_string()))?;

    // 事前走査: 図形の有無と共有数式の有無
    let mut has_drawings = false;
    let mut has_shared = false;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        if is_drawing_part(&name) {
            has_drawings = true;
        } else if is_worksheet_part(&name) {
            let mut xml = String::new();
            file.read_to_string(&mut xml).ok();
            if xml.contains(r#"t="shared""#) {
                has_shared = true;
            }
        }
    }

    if !has_drawings && !has_shared {
        return Ok((bytes.to_vec(), SanitizeReport::default()));
    }

    let mut report = SanitizeReport::default();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let name = {
            let file = archive.by_index(i)?;
            file.name().to_string()
        };

        // 図形ファイルは丸ごと落とす
        if has_drawings && is_drawing_part(&name) {
            report.drawings_removed += 1;
            continue;
        }

        let needs_patch = is_worksheet_part(&name)
            || (has_drawings && (is_rels_part(&name) || name == "[Content_Types].xml"));

        if !needs_patch {
            // 触れないエントリは生コピー（バイトと圧縮をそのまま保存）
            let file = archive.by_index_raw(i)?;
            writer.raw_copy_file(file)?;
            continue;
        }

        let mut xml = String::new();
        archive.by_index(i)?.read_to_string(&mut xml).map_err(|e| {
            CertAiError::Sanitize(format!("{} の読み込みに失敗: {}", name, e))
        })?;

        let patched = if is_worksheet_part(&name) {
            let mut sheet_xml = xml;
            if has_drawings {
                sheet_xml = DRAWING_REF_RE.replace_all(&sheet_xml, "").into_owned();
            }
            let (expanded_xml, count) = expand_shared_formulas(&sheet_xml);
            report.shared_formulas_expanded += count;
            expanded_xml
        } else if is_rels_part(&name) {
            DRAWING_REL_RE.replace_all(&xml, "").into_owned()
        } else {
            // [Content_Types].xml
            let xml = DRAWING_OVERRIDE_RE.replace_all(&xml, "").into_owned();
            VML_DEFAULT_RE.replace_all(&xml, "").into_owned()
        };

        writer.start_file(name, options)?;
        writer.write_all(patched.as_bytes())?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| CertAiError::Sanitize(e.to_string()))?;
    Ok((cursor.into_inner(), report))
}
