//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化。ヘルスチェック結果とエラーログは追記専用で、
//! 削除は保持期間による一括削除と運用者による明示削除のみ。

/// データベース初期化・マイグレーション
pub mod migrations;

/// ヘルスチェック結果ストレージ
pub mod health_checks;

/// エラーログストレージ
pub mod error_logs;

/// 設定管理
pub mod settings;
