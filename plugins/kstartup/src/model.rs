use serde::{Deserialize, Serialize};

/// One page of the K-Startup announcement API.
#[derive(Debug, Clone, Deserialize)]
pub struct KstartupListResponse {
    #[serde(default)]
    pub current_count: u32,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub data: Vec<KstartupItem>,
}

/// One announcement record. The API inlines the body text, so no detail
/// round-trip is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KstartupItem {
    pub pbanc_sn: Option<u64>,
    /// 공고명
    pub biz_pbanc_nm: String,
    /// 공고 본문
    pub pbanc_ctnt: String,
    /// 주관기관명
    pub pbanc_ntrp_nm: Option<String>,
    /// 지원사업 분류
    pub supt_biz_clsfc: Option<String>,
    /// 접수 시작일 (yyyymmdd)
    pub pbanc_rcpt_bgng_dt: Option<String>,
    /// 접수 종료일 (yyyymmdd)
    pub pbanc_rcpt_end_dt: Option<String>,
    pub detl_pg_url: Option<String>,
}

impl KstartupItem {
    pub fn detail_url(&self) -> Option<String> {
        if let Some(url) = &self.detl_pg_url {
            if !url.trim().is_empty() {
                return Some(url.trim().to_string());
            }
        }
        self.pbanc_sn.map(|sn| {
            format!("https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do?pbancSn={sn}")
        })
    }

    /// "20250701" / "20250731" -> "2025-07-01 ~ 2025-07-31"
    pub fn reception_period(&self) -> Option<String> {
        let begin = format_date(self.pbanc_rcpt_bgng_dt.as_deref()?)?;
        let end = format_date(self.pbanc_rcpt_end_dt.as_deref()?)?;
        Some(format!("{begin} ~ {end}"))
    }
}

fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8]))
    } else {
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reception_period_formats_compact_dates() {
        let item = KstartupItem {
            pbanc_rcpt_bgng_dt: Some("20250701".to_string()),
            pbanc_rcpt_end_dt: Some("20250731".to_string()),
            ..KstartupItem::default()
        };
        assert_eq!(
            item.reception_period().as_deref(),
            Some("2025-07-01 ~ 2025-07-31")
        );
    }

    #[test]
    fn detail_url_falls_back_to_sequence_number() {
        let item = KstartupItem {
            pbanc_sn: Some(174321),
            detl_pg_url: Some("  ".to_string()),
            ..KstartupItem::default()
        };
        assert_eq!(
            item.detail_url().as_deref(),
            Some("https://www.k-startup.go.kr/web/contents/bizpbanc-ongoing.do?pbancSn=174321")
        );
    }
}
