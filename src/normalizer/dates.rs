//! 有効期限の解決と証明書ステータスの導出
//!
//! - 期限が未記載の証明書は発行日から3年を有効期限とみなす（3年ルール）
//! - 日付が全く取れない場合は空文字を返し、台帳側では "No Date" と表記する
//!   （「データなし」と「無期限」の区別を曖昧にしないため）

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// 台帳に書く日付なしの表記
pub const NO_DATE_TEXT: &str = "No Date";

/// 証明書ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CertStatus {
    /// 有効期限が取れない
    #[default]
    Unknown,
    /// 有効期限が今日以降
    Valid,
    /// 有効期限切れ
    Expired,
}

impl CertStatus {
    /// 台帳のステータス列のキャッシュ値として書く文字列
    pub fn as_cell_text(self) -> &'static str {
        match self {
            CertStatus::Unknown => NO_DATE_TEXT,
            CertStatus::Valid => "Up to date",
            CertStatus::Expired => "Expired",
        }
    }
}

/// 日付値がセンチネル（実質空）か
fn is_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("not found")
}

/// 複数フォーマットを許容する日付パース
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if is_sentinel(trimmed) {
        return None;
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%Y.%m.%d",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// 発行日に3暦年を加える（2/29は2/28に丸める）
fn add_three_years(date: NaiveDate) -> NaiveDate {
    let year = date.year() + 3;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// 有効期限を解決する（3年ルール）
///
/// 1. 期限が実値 → そのまま返す（トリムのみ）
/// 2. 期限なし・発行日がパース可能 → 発行日+3年をISO形式で返す
/// 3. どちらもなし → 空文字列（呼び出し側が "No Date" として表記する）
pub fn effective_expiry(expiry_date: &str, issue_date: &str) -> String {
    if !is_sentinel(expiry_date) {
        return expiry_date.trim().to_string();
    }

    match parse_date(issue_date) {
        Some(issued) => add_three_years(issued).format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}

/// 有効期限文字列からステータスを導出する
pub fn status_for(effective_expiry: &str, today: NaiveDate) -> CertStatus {
    match parse_date(effective_expiry) {
        None => CertStatus::Unknown,
        Some(expiry) if expiry >= today => CertStatus::Valid,
        Some(_) => CertStatus::Expired,
    }
}

/// 今日を基準にしたステータス
pub fn status_today(effective_expiry: &str) -> CertStatus {
    status_for(effective_expiry, Local::now().date_naive())
}

/// 残日数（期限が取れない場合はNone）
pub fn days_to_expire(effective_expiry: &str, today: NaiveDate) -> Option<i64> {
    parse_date(effective_expiry).map(|expiry| (expiry - today).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_expiry_verbatim() {
        assert_eq!(effective_expiry("2026-06-30", "2024-01-15"), "2026-06-30");
        assert_eq!(effective_expiry(" 2026-06-30 ", ""), "2026-06-30");
    }

    #[test]
    fn test_effective_expiry_three_year_rule() {
        assert_eq!(effective_expiry("", "2024-01-15"), "2027-01-15");
        assert_eq!(effective_expiry("Not Found", "2024-01-15"), "2027-01-15");
        assert_eq!(effective_expiry("-", "2024-01-15"), "2027-01-15");
    }

    #[test]
    fn test_effective_expiry_leap_day() {
        // 2024-02-29 + 3年 → 2027-02-28
        assert_eq!(effective_expiry("", "2024-02-29"), "2027-02-28");
    }

    #[test]
    fn test_effective_expiry_no_dates() {
        assert_eq!(effective_expiry("", ""), "");
        assert_eq!(effective_expiry("Not Found", "-"), "");
        assert_eq!(effective_expiry("", "garbage"), "");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("2024/01/15"), Some(expected));
        assert_eq!(parse_date("15.01.2024"), Some(expected));
        assert_eq!(parse_date("15/01/2024"), Some(expected));
        assert_eq!(parse_date("not found"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_status_for() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(status_for("2025-06-01", today), CertStatus::Valid);
        assert_eq!(status_for("2026-01-01", today), CertStatus::Valid);
        assert_eq!(status_for("2025-05-31", today), CertStatus::Expired);
        assert_eq!(status_for("", today), CertStatus::Unknown);
        assert_eq!(status_for("No Date", today), CertStatus::Unknown);
    }

    #[test]
    fn test_days_to_expire() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(days_to_expire("2025-06-11", today), Some(10));
        assert_eq!(days_to_expire("2025-05-31", today), Some(-1));
        assert_eq!(days_to_expire("", today), None);
    }

    #[test]
    fn test_status_cell_text() {
        assert_eq!(CertStatus::Valid.as_cell_text(), "Up to date");
        assert_eq!(CertStatus::Expired.as_cell_text(), "Expired");
        assert_eq!(CertStatus::Unknown.as_cell_text(), "No Date");
    }
}
