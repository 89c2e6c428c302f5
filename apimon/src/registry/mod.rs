//! エンドポイントレジストリ
//!
//! プローブ対象ルートの静的カタログ（カテゴリ別）。起動時に読み込み、実行中は変更しない。
//! 自動プローブ対象は副作用のない GET のみ。

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// HTTPメソッド
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// メソッド名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// レジストリエントリ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// パス（例: "/api/deals"）
    pub path: String,
    /// HTTPメソッド
    pub method: HttpMethod,
    /// カテゴリ
    pub category: String,
    /// Bearer認証が必要か
    pub requires_auth: bool,
}

impl EndpointDescriptor {
    /// GETエントリを作成
    pub fn get(path: &str, category: &str, requires_auth: bool) -> Self {
        Self {
            path: path.to_string(),
            method: HttpMethod::Get,
            category: category.to_string(),
            requires_auth,
        }
    }
}

/// YAMLカタログ内のエントリ（カテゴリはキー側）
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    path: String,
    #[serde(default = "default_method")]
    method: HttpMethod,
    #[serde(default)]
    requires_auth: bool,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: BTreeMap<String, Vec<CatalogEntry>>,
}

/// エンドポイントレジストリ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointDescriptor>,
}

impl EndpointRegistry {
    /// エントリ一覧から作成
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self { endpoints }
    }

    /// 組み込みカタログ
    pub fn builtin() -> Self {
        Self::new(vec![
            EndpointDescriptor::get("/api/health", "system", false),
            EndpointDescriptor::get("/api/auth/me", "auth", true),
            EndpointDescriptor {
                path: "/api/auth/login".to_string(),
                method: HttpMethod::Post,
                category: "auth".to_string(),
                requires_auth: false,
            },
            EndpointDescriptor::get("/api/deals", "deals", true),
            EndpointDescriptor::get("/api/deals/stats", "deals", true),
            EndpointDescriptor {
                path: "/api/deals".to_string(),
                method: HttpMethod::Post,
                category: "deals".to_string(),
                requires_auth: true,
            },
            EndpointDescriptor::get("/api/carriers", "carriers", true),
            EndpointDescriptor::get("/api/products", "products", true),
            EndpointDescriptor::get("/api/products/categories", "products", true),
        ])
    }

    /// YAML文字列から読み込む
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let catalog: CatalogFile =
            serde_yaml::from_str(yaml).context("Failed to parse endpoint catalog")?;

        let endpoints = catalog
            .categories
            .into_iter()
            .flat_map(|(category, entries)| {
                entries.into_iter().map(move |entry| EndpointDescriptor {
                    path: entry.path,
                    method: entry.method,
                    category: category.clone(),
                    requires_auth: entry.requires_auth,
                })
            })
            .collect();

        Ok(Self::new(endpoints))
    }

    /// YAMLファイルから読み込む
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read endpoint catalog {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// 設定に応じてレジストリを読み込む（パス未指定なら組み込みカタログ）
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(Path::new(path)),
            None => Ok(Self::builtin()),
        }
    }

    /// 自動プローブ対象（GETのみ）
    pub fn list_get_endpoints(&self) -> Vec<EndpointDescriptor> {
        self.endpoints
            .iter()
            .filter(|e| e.method == HttpMethod::Get)
            .cloned()
            .collect()
    }

    /// 全エントリ
    pub fn all(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    /// カテゴリ別のグループ
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&EndpointDescriptor>> {
        let mut groups: BTreeMap<&str, Vec<&EndpointDescriptor>> = BTreeMap::new();
        for endpoint in &self.endpoints {
            groups
                .entry(endpoint.category.as_str())
                .or_default()
                .push(endpoint);
        }
        groups
    }

    /// エントリ数
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// 空か
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
