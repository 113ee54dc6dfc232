//! 名寄せ（正規化）モジュール
//!
//! サプライヤー名を照合用の正準キーに変換する。
//!
//! ## 処理フロー
//! 1. ダイアクリティカルマーク除去（NFD分解 + 置換テーブル）
//! 2. 小文字化・記号のスペース置換
//! 3. 法人格サフィックス・一般語の除去
//! 4. トークンのアルファベット順ソート・結合
//!
//! 語順とサフィックスに依存しないキーを作るのが目的:
//! "ABC Trading Ltd" と "Trading ABC" は同じキーになる。

pub mod dates;
pub mod similarity;

use lazy_static::lazy_static;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// 法人格サフィックス（各国）
    static ref LEGAL_SUFFIXES: HashSet<&'static str> = [
        // 英語圏
        "ltd", "limited", "llc", "llp", "lp", "inc", "incorporated",
        "corp", "corporation", "co", "company", "plc",
        // ドイツ語圏
        "gmbh", "mbh", "ag", "kg", "kgaa", "ug", "ev",
        // フランス・スペイン・イタリア・南米
        "sa", "sas", "sarl", "sl", "slu", "srl", "spa", "snc", "ltda", "eirl",
        // ベネルクス
        "bv", "nv", "vof", "cv",
        // 北欧
        "as", "asa", "ab", "oy", "oyj", "aps", "ehf",
        // 東欧
        "sp", "zoo", "sro", "doo", "ooo", "zao", "oao", "pao",
        "kft", "bt", "zrt", "nyrt", "ad", "dd",
        // トルコ
        "sti",
        // アジア・オセアニア
        "pty", "bhd", "sdn", "pvt", "pte", "kk", "gk", "yk", "se",
    ].into_iter().collect();

    /// 業種を示すだけの一般語（名寄せのノイズになる）
    static ref NOISE_WORDS: HashSet<&'static str> = [
        "group", "grupo", "gruppe", "holding", "holdings",
        "trading", "international", "intl", "global",
        "enterprise", "enterprises", "industries", "industrie",
    ].into_iter().collect();
}

/// NFD分解で消えない文字の明示的な置換テーブル
/// （トルコ語・ドイツ語・ポーランド語など）
fn substitute_special(c: char) -> Option<&'static str> {
    match c {
        'ğ' | 'Ğ' => Some("g"),
        'ı' | 'İ' => Some("i"),
        'ş' | 'Ş' => Some("s"),
        'ç' | 'Ç' => Some("c"),
        'ö' | 'Ö' => Some("o"),
        'ü' | 'Ü' => Some("u"),
        'ä' | 'Ä' => Some("a"),
        'ß' => Some("ss"),
        'ł' | 'Ł' => Some("l"),
        'ą' | 'Ą' => Some("a"),
        'ę' | 'Ę' => Some("e"),
        'ż' | 'Ż' | 'ź' | 'Ź' => Some("z"),
        'ć' | 'Ć' => Some("c"),
        'ń' | 'Ń' => Some("n"),
        'ś' | 'Ś' => Some("s"),
        'ø' | 'Ø' => Some("o"),
        'å' | 'Å' => Some("a"),
        'æ' | 'Æ' => Some("ae"),
        'đ' | 'Đ' => Some("d"),
        'þ' | 'Þ' => Some("th"),
        _ => None,
    }
}

/// ダイアクリティカルマークを除去する
///
/// 置換テーブルを先に適用し、残りはNFD分解して結合文字を落とす。
fn strip_diacritics(input: &str) -> String {
    let mut substituted = String::with_capacity(input.len());
    for c in input.chars() {
        match substitute_special(c) {
            Some(s) => substituted.push_str(s),
            None => substituted.push(c),
        }
    }

    substituted
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// トークンが純粋な数字か
fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// サプライヤー名を正準キーに変換する
///
/// # Arguments
/// * `name` - 任意のサプライヤー名
///
/// # Returns
/// 照合用の正準キー。空白のみの入力は空文字列（決してマッチしない）。
pub fn canonical_key(name: &str) -> String {
    let stripped = strip_diacritics(name).to_lowercase();

    // 記号をスペースに置換してトークン化
    let cleaned: String = stripped
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .filter(|t| !is_numeric_token(t))
        .filter(|t| !LEGAL_SUFFIXES.contains(t))
        .filter(|t| !NOISE_WORDS.contains(t))
        .collect();

    tokens.sort_unstable();
    tokens.join(" ")
}
