/// マスタエントリ（マスタ台帳から読み込み）
///
/// 読み込み後は不変。マスタ再読み込み時に索引ごと作り直す。
#[derive(Debug, Clone)]
pub struct SupplierEntry {
    pub official_name: String,
    pub country: Option<String>,
    pub account_code: Option<String>,
}

/// あいまい照合の結果
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// マッチした正式名（未マッチ時は入力名をそのまま返す）
    pub matched_name: String,
    pub was_matched: bool,
    pub confidence: f64,
    pub matched_account: Option<String>,
    pub country: Option<String>,
}
