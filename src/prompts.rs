//! Prompt templates and the batch chat-completions request records.
//!
//! The JSONL field names (`custom_id`, `method`, `url`, `body.*`) follow the
//! OpenAI batch contract and must round-trip unchanged through the remote
//! completion file.

use serde::{Deserialize, Serialize};

use crate::pairs::ArticlePair;

pub const DEFAULT_MODEL: &str = "gpt-4.1-2025-04-14";
pub const CHAT_COMPLETIONS_URL: &str = "/v1/chat/completions";
pub const TEMPERATURE: f32 = 0.1;
pub const MAX_TOKENS: u32 = 1024;

pub const SYSTEM_INSTRUCTION: &str = "\
You verify the authorship of news articles. Given two articles, decide \
whether they were written by the same news outlet.

Ignore natural stylistic differences that follow from the topic (politics, \
entertainment, economy). Focus instead on the outlet's editorial style: \
formatting conventions and stylistic habits that stay consistent across \
topics.

Respond with a JSON object holding two key elements:
\"analysis\": the reasoning behind your answer.
\"answer\": a boolean, true when both articles were written by the same \
outlet.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One line of the batch input JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: RequestBody,
}

/// Ground-truth label, recoverable from the custom id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldLabel {
    Same,
    Diff,
}

impl GoldLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoldLabel::Same => "same",
            GoldLabel::Diff => "diff",
        }
    }
}

pub fn gold_label_of(custom_id: &str) -> Option<GoldLabel> {
    if custom_id.starts_with("same_source_pair_") {
        Some(GoldLabel::Same)
    } else if custom_id.starts_with("diff_source_pair_") {
        Some(GoldLabel::Diff)
    } else {
        None
    }
}

pub fn build_user_prompt(pair: &ArticlePair) -> String {
    format!(
        "## Article 1: {title1}\n\n```txt\n{text1}\n```\n\n\n\
         ## Article 2: {title2}\n\n```txt\n{text2}\n```",
        title1 = pair.first.title,
        text1 = pair.first.text,
        title2 = pair.second.title,
        text2 = pair.second.text,
    )
}

/// Serialize both pair lists into batch requests. Same-pairs come first,
/// then diff-pairs, numbered by one shared running counter.
pub fn build_requests(
    same_pairs: &[ArticlePair],
    diff_pairs: &[ArticlePair],
    model: &str,
) -> Vec<BatchRequest> {
    let mut requests = Vec::with_capacity(same_pairs.len() + diff_pairs.len());
    let mut seq = 0usize;
    for (label, pairs) in [(GoldLabel::Same, same_pairs), (GoldLabel::Diff, diff_pairs)] {
        for pair in pairs {
            let messages = vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_INSTRUCTION.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: build_user_prompt(pair),
                },
            ];
            requests.push(BatchRequest {
                custom_id: format!("{}_source_pair_{seq:04}", label.as_str()),
                method: "POST".into(),
                url: CHAT_COMPLETIONS_URL.into(),
                body: RequestBody {
                    model: model.to_owned(),
                    messages,
                    response_format: ResponseFormat {
                        format_type: "json_object".into(),
                    },
                    temperature: TEMPERATURE,
                    max_tokens: MAX_TOKENS,
                },
            });
            seq += 1;
        }
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::Article;

    fn pair(src1: &str, src2: &str) -> ArticlePair {
        let make = |src: &str| Article {
            source: src.to_owned(),
            title: format!("{src} headline"),
            text: format!("{src} body"),
        };
        ArticlePair {
            first: make(src1),
            second: make(src2),
        }
    }

    #[test]
    fn requests_carry_ids_in_submission_order() {
        let same = vec![pair("a", "a"), pair("b", "b")];
        let diff = vec![pair("a", "b")];
        let requests = build_requests(&same, &diff, DEFAULT_MODEL);

        let ids: Vec<&str> = requests.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "same_source_pair_0000",
                "same_source_pair_0001",
                "diff_source_pair_0002",
            ]
        );
        assert!(requests.iter().all(|r| r.method == "POST"));
        assert!(requests.iter().all(|r| r.url == CHAT_COMPLETIONS_URL));
    }

    #[test]
    fn gold_label_round_trips_through_the_id() {
        let same = vec![pair("a", "a")];
        let diff = vec![pair("a", "b")];
        let requests = build_requests(&same, &diff, DEFAULT_MODEL);
        assert_eq!(gold_label_of(&requests[0].custom_id), Some(GoldLabel::Same));
        assert_eq!(gold_label_of(&requests[1].custom_id), Some(GoldLabel::Diff));
        assert_eq!(gold_label_of("something_else_0003"), None);
    }

    #[test]
    fn request_body_matches_the_batch_contract() {
        let requests = build_requests(&[pair("a", "a")], &[], "test-model");
        let line = serde_json::to_value(&requests[0]).unwrap();
        assert_eq!(line["body"]["model"], "test-model");
        assert_eq!(line["body"]["response_format"]["type"], "json_object");
        assert_eq!(line["body"]["messages"][0]["role"], "system");
        assert_eq!(line["body"]["messages"][1]["role"], "user");
        assert!(line["body"]["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("## Article 1"));
    }
}
