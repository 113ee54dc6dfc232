//! 抽出結果の型定義
//!
//! ExtractionRecord: 証明書1枚分の抽出フィールド。
//! 外部分類器（ビジョン/テキストモデル）のJSON契約に合わせ、
//! 旧フィールド名のエイリアスと欠損フィールドを取り込み時に解決する。
//! 以降の処理でエイリアスを再解決することはない。

use crate::normalizer::dates::{self, CertStatus};
use serde::{Deserialize, Serialize};

/// 証明書1枚分の抽出レコード
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionRecord {
    pub supplier_name: String,

    #[serde(alias = "certNumber")]
    pub certificate_number: String,

    pub country: String,

    /// 適用範囲記号（"+" / "!" など）。台帳側で文字列書式を強制する
    pub scope: String,

    /// 規格・措置。旧レスポンスは "ecRegulation" で返す
    #[serde(alias = "ecRegulation")]
    pub measure: String,

    #[serde(alias = "certificationBody")]
    pub certification: String,

    pub product_category: String,

    #[serde(alias = "issuedDate")]
    pub issue_date: String,

    #[serde(alias = "expirationDate")]
    pub expiry_date: String,

    pub file_name: String,

    /// 抽出値ではなく取り込み時に導出する
    pub status: CertStatus,

    // ---- 照合メタデータ（業務データではない。台帳へは明示的に
    //      マップされた列以外に書かない） ----
    #[serde(rename = "_matchedAccount", skip_serializing_if = "Option::is_none")]
    pub matched_account: Option<String>,

    #[serde(
        rename = "_originalSupplierName",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_supplier_name: Option<String>,

    #[serde(rename = "_matchConfidence", skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
}

impl ExtractionRecord {
    /// 3年ルール適用後の有効期限（空文字は日付なし）
    pub fn effective_expiry(&self) -> String {
        dates::effective_expiry(&self.expiry_date, &self.issue_date)
    }

    /// 取り込み時の正規化: 各フィールドのトリムとステータス導出
    ///
    /// 分類器はnull/空文字をどのフィールドにも返しうるため、
    /// ここで一度だけ防御的に整える。
    pub fn finalize(&mut self) {
        self.supplier_name = self.supplier_name.trim().to_string();
        self.certificate_number = self.certificate_number.trim().to_string();
        self.country = self.country.trim().to_string();
        self.scope = self.scope.trim().to_string();
        self.measure = self.measure.trim().to_string();
        self.certification = self.certification.trim().to_string();
        self.product_category = self.product_category.trim().to_string();
        self.issue_date = self.issue_date.trim().to_string();
        self.expiry_date = self.expiry_date.trim().to_string();
        self.status = dates::status_today(&self.effective_expiry());
    }
}
