// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Batch listing: turn pasted ticket text into drafts, then publish them.
//!
//! Parsing prefers the configured chat-completions endpoint and falls back
//! to a line-based rule parser. Publishing runs every draft through
//! [`publish_post`], so each draft is charged like a single publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::posts::{publish_post, NewPost};
use super::{MarketError, MarketResult};
use crate::providers::ChatCompletionsClient;
use crate::storage::MarketDb;

pub const DEFAULT_BATCH_TRADE_TYPE: u8 = 2;
pub const MAX_BATCH_DRAFTS: usize = 100;

const SYSTEM_PROMPT: &str = "你是一个票务信息解析助手。严格按照规则解析，只输出JSON数组。";

const PROMPT_RULES: &str = r#"解析规则：
1. 第一行是基础信息，提取演出名称（如"成都周深"、"上海梁静茹"等城市+歌手名）
2. 后续每行格式为"票档的价格"，例如：
   - "399的900" → 票档=399, 价格=900
   - "包厢的1150" → 票档=包厢, 价格=1150
   - "1050-1199" → 票档=1050, 价格=1199（用-分隔时，前面是票档，后面是价格）
3. 生成标题 = 演出名称 + 票档，例如"成都周深399"
4. 价格 = "的"后面或"-"后面的数字

示例输入：
成都周深 2号邀请函代录
399的900
699的1000
包厢的1150

示例输出：
[
  {"title": "成都周深399", "price": 900},
  {"title": "成都周深699", "price": 1000},
  {"title": "成都周深包厢", "price": 1150}
]

只返回JSON数组，不要其他文字："#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Draft {
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub trade_type: Option<u8>,
    /// Needed for long and short posts.
    #[serde(default)]
    pub delivery_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    Ai,
    Rules,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParsedDrafts {
    pub drafts: Vec<Draft>,
    pub count: usize,
    pub source: DraftSource,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DraftFailure {
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchPublishReport {
    pub success_count: usize,
    pub total_count: usize,
    /// `None` when every draft was published.
    pub errors: Option<Vec<DraftFailure>>,
    pub message: String,
}

/// Parse free text into drafts.
///
/// A failing or empty AI answer is logged and the rule parser is used
/// instead. When the AI call itself failed and the rules find nothing
/// either, the failure is reported as [`MarketError::Upstream`].
pub async fn parse_drafts(
    ai: Option<&ChatCompletionsClient>,
    text: &str,
    trade_type: Option<u8>,
) -> MarketResult<ParsedDrafts> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MarketError::validation("text_input is required"));
    }
    let trade_type = trade_type.unwrap_or(DEFAULT_BATCH_TRADE_TYPE);

    let mut from_ai = None;
    let mut ai_failed = false;
    if let Some(client) = ai {
        let prompt = format!("解析以下演唱会票务信息，返回JSON数组。\n\n输入文本：\n{text}\n\n{PROMPT_RULES}");
        match client.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => {
                tracing::debug!(model = client.model(), reply = %reply, "Batch parse reply");
                let drafts = extract_drafts(&reply, trade_type);
                if drafts.is_empty() {
                    tracing::warn!("AI reply held no drafts, using rule parser");
                } else {
                    from_ai = Some(drafts);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI parse failed, using rule parser");
                ai_failed = true;
            }
        }
    }

    let (drafts, source) = match from_ai {
        Some(drafts) => (drafts, DraftSource::Ai),
        None => {
            let drafts = parse_with_rules(text, trade_type);
            if drafts.is_empty() && ai_failed {
                return Err(MarketError::Upstream(
                    "listing parser unreachable and no listings matched the text rules".to_string(),
                ));
            }
            (drafts, DraftSource::Rules)
        }
    };
    let count = drafts.len();
    Ok(ParsedDrafts {
        drafts,
        count,
        source,
        message: format!("Parsed {count} listings"),
    })
}

/// Drafts from the first JSON array in a model reply. Malformed items are
/// skipped.
///
/// The array is read with a streaming deserializer starting at the first
/// `[`, so nested arrays and any prose after the closing bracket are fine.
pub fn extract_drafts(reply: &str, trade_type: u8) -> Vec<Draft> {
    let Some(start) = reply.find('[') else {
        return Vec::new();
    };
    let mut stream = serde_json::Deserializer::from_str(&reply[start..]).into_iter::<Vec<Value>>();
    let items = match stream.next() {
        Some(Ok(items)) => items,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "AI reply array is not valid JSON");
            return Vec::new();
        }
        None => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            let price = match item.get("price") {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            };
            let keywords = item
                .get("keywords")
                .and_then(Value::as_array)
                .map(|k| k.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            Some(Draft {
                title: title.to_string(),
                price,
                description: item
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                keywords,
                trade_type: Some(trade_type),
                delivery_days: None,
            })
        })
        .collect()
}

/// Line-based parser. The first line's first token is the show name;
/// every later `tier的price` or `tier-price` line becomes one draft.
pub fn parse_with_rules(text: &str, trade_type: u8) -> Vec<Draft> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let show = header.split_whitespace().next().unwrap_or(header);

    lines
        .filter_map(|line| {
            let (tier, price) = line.split_once('的').or_else(|| line.split_once('-'))?;
            let tier = tier.trim();
            let price: f64 = price.trim().trim_end_matches('元').trim().parse().ok()?;
            if tier.is_empty() || !price.is_finite() {
                return None;
            }
            Some(Draft {
                title: format!("{show}{tier}"),
                price,
                description: String::new(),
                keywords: vec![show.to_string()],
                trade_type: Some(trade_type),
                delivery_days: None,
            })
        })
        .collect()
}

/// Publish each draft on its own. Failures are collected and the rest
/// continue.
pub fn publish_drafts(
    db: &MarketDb,
    user_id: &str,
    drafts: Vec<Draft>,
    trade_type: Option<u8>,
    now: DateTime<Utc>,
) -> MarketResult<BatchPublishReport> {
    if drafts.is_empty() {
        return Err(MarketError::validation("No drafts to publish"));
    }
    if drafts.len() > MAX_BATCH_DRAFTS {
        return Err(MarketError::validation(format!(
            "At most {MAX_BATCH_DRAFTS} drafts per batch"
        )));
    }

    let total_count = drafts.len();
    let mut success_count = 0;
    let mut errors = Vec::new();
    for draft in drafts {
        let keywords = if draft.keywords.is_empty() {
            draft.title.clone()
        } else {
            draft.keywords.join(",")
        };
        let input = NewPost {
            title: draft.title.clone(),
            keywords,
            price: draft.price,
            trade_type: draft
                .trade_type
                .or(trade_type)
                .unwrap_or(DEFAULT_BATCH_TRADE_TYPE),
            delivery_days: draft.delivery_days,
            extra_info: Some(draft.description),
            ..Default::default()
        };
        match publish_post(db, user_id, input, now) {
            Ok(_) => success_count += 1,
            Err(e) => {
                tracing::warn!(user_id = %user_id, title = %draft.title, error = %e, "Draft publish failed");
                errors.push(DraftFailure {
                    title: draft.title,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(user_id = %user_id, success_count, total_count, "Batch publish finished");
    Ok(BatchPublishReport {
        success_count,
        total_count,
        errors: (!errors.is_empty()).then_some(errors),
        message: format!("Published {success_count}/{total_count} listings"),
    })
}
