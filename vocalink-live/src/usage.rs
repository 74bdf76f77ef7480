//! Token usage accounting split by modality.
//!
//! All sums saturate at `u64::MAX`.

use crate::protocol::{ModalityTokenCount, UsageMetadata};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token counts for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityTokens {
    pub text_tokens: u64,
    pub audio_tokens: u64,
}

impl ModalityTokens {
    /// Sum of all modalities.
    pub fn total(&self) -> u64 {
        self.text_tokens.saturating_add(self.audio_tokens)
    }

    fn from_details(details: Option<&[ModalityTokenCount]>) -> Self {
        let mut tokens = Self::default();
        for detail in details.unwrap_or_default() {
            let count = detail.token_count.unwrap_or(0);
            match detail.modality.as_str() {
                "TEXT" => tokens.text_tokens = tokens.text_tokens.saturating_add(count),
                "AUDIO" => tokens.audio_tokens = tokens.audio_tokens.saturating_add(count),
                _ => {}
            }
        }
        tokens
    }
}

impl Add for ModalityTokens {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            text_tokens: self.text_tokens.saturating_add(rhs.text_tokens),
            audio_tokens: self.audio_tokens.saturating_add(rhs.audio_tokens),
        }
    }
}

/// Input and output token usage derived from one usage report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub input: ModalityTokens,
    pub output: ModalityTokens,
}

impl UsageRecord {
    /// Aggregate a usage report by modality.
    ///
    /// Modalities other than text and audio are ignored.
    pub fn from_metadata(metadata: &UsageMetadata) -> Self {
        Self {
            input: ModalityTokens::from_details(metadata.prompt_tokens_details.as_deref()),
            output: ModalityTokens::from_details(metadata.response_tokens_details.as_deref()),
        }
    }

    /// Sum of input and output tokens.
    pub fn total(&self) -> u64 {
        self.input.total().saturating_add(self.output.total())
    }
}

impl Add for UsageRecord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { input: self.input + rhs.input, output: self.output + rhs.output }
    }
}

impl AddAssign for UsageRecord {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(modality: &str, count: Option<u64>) -> ModalityTokenCount {
        ModalityTokenCount { modality: modality.to_string(), token_count: count }
    }

    #[test]
    fn test_from_metadata_splits_by_modality() {
        let metadata = UsageMetadata {
            prompt_tokens_details: Some(vec![
                detail("TEXT", Some(12)),
                detail("AUDIO", Some(40)),
                detail("TEXT", Some(3)),
            ]),
            response_tokens_details: Some(vec![detail("AUDIO", Some(90)), detail("TEXT", None)]),
            ..Default::default()
        };

        let usage = UsageRecord::from_metadata(&metadata);
        assert_eq!(usage.input, ModalityTokens { text_tokens: 15, audio_tokens: 40 });
        assert_eq!(usage.output, ModalityTokens { text_tokens: 0, audio_tokens: 90 });
        assert_eq!(usage.total(), 145);
    }

    #[test]
    fn test_from_metadata_ignores_other_modalities() {
        let metadata = UsageMetadata {
            prompt_tokens_details: Some(vec![detail("IMAGE", Some(500)), detail("VIDEO", Some(7))]),
            ..Default::default()
        };
        assert_eq!(UsageRecord::from_metadata(&metadata), UsageRecord::default());
    }

    #[test]
    fn test_from_empty_metadata() {
        assert_eq!(UsageRecord::from_metadata(&UsageMetadata::default()).total(), 0);
    }

    #[test]
    fn test_accumulate() {
        let a = UsageRecord {
            input: ModalityTokens { text_tokens: 1, audio_tokens: 2 },
            output: ModalityTokens { text_tokens: 3, audio_tokens: 4 },
        };
        let mut total = UsageRecord::default();
        total += a;
        total += a;
        assert_eq!(total.input.audio_tokens, 4);
        assert_eq!(total.output.text_tokens, 6);
        assert_eq!(total.total(), 20);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let metadata = UsageMetadata {
            prompt_tokens_details: Some(vec![
                detail("AUDIO", Some(u64::MAX)),
                detail("AUDIO", Some(5)),
                detail("TEXT", Some(1)),
            ]),
            ..Default::default()
        };
        let usage = UsageRecord::from_metadata(&metadata);
        assert_eq!(usage.input.audio_tokens, u64::MAX);
        assert_eq!(usage.total(), u64::MAX);

        let mut total = usage;
        total += usage;
        assert_eq!(total.input.audio_tokens, u64::MAX);
        assert_eq!(total.input.text_tokens, 2);
    }
}
