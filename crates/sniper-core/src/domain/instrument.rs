use serde::{Deserialize, Serialize};

/// 추적 대상 종목.
///
/// `token_id`는 호가 조회에, [`Instrument::key`]는 원장 키로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// 거래소 토큰 ID
    #[serde(rename = "id")]
    pub token_id: String,
    /// 사람이 읽기 쉬운 이름 (원장 키로 우선 사용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Instrument {
    /// 새 종목 생성.
    pub fn new(token_id: impl Into<String>, slug: Option<String>) -> Self {
        Self {
            token_id: token_id.into(),
            slug: slug.filter(|s| !s.trim().is_empty()),
        }
    }

    /// 원장 키: slug가 있으면 slug, 없으면 토큰 ID.
    pub fn key(&self) -> &str {
        self.slug.as_deref().unwrap_or(&self.token_id)
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_slug() {
        let with_slug = Instrument::new("9004", Some("elon-tweets".to_string()));
        assert_eq!(with_slug.key(), "elon-tweets");

        let without_slug = Instrument::new("9004", None);
        assert_eq!(without_slug.key(), "9004");

        let blank_slug = Instrument::new("9004", Some("  ".to_string()));
        assert_eq!(blank_slug.key(), "9004");
    }
}
