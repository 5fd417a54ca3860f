use ovai_protocol::gemini::ThinkingConfig;
use ovai_protocol::native::ThinkFlag;

use crate::error::TranslateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkLevel {
    None,
    Low,
    Medium,
    High,
    Default,
}

impl ThinkLevel {
    pub fn from_flag(flag: &ThinkFlag) -> Result<Self, TranslateError> {
        match flag {
            ThinkFlag::Enabled(true) => Ok(Self::Default),
            ThinkFlag::Enabled(false) => Ok(Self::None),
            ThinkFlag::Level(level) => Self::parse(level),
        }
    }

    pub fn parse(level: &str) -> Result<Self, TranslateError> {
        match level {
            // `minimal` is the completions spelling of `none`.
            "none" | "minimal" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "default" => Ok(Self::Default),
            other => Err(TranslateError::InvalidThinkLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelFamily {
    Pro,
    FlashLite,
    Flash,
}

fn model_family(model: &str) -> Result<ModelFamily, TranslateError> {
    // flash-lite must be matched before flash.
    if model.starts_with("gemini-2.5-pro") {
        Ok(ModelFamily::Pro)
    } else if model.starts_with("gemini-2.5-flash-lite") {
        Ok(ModelFamily::FlashLite)
    } else if model.starts_with("gemini-2.5-flash") {
        Ok(ModelFamily::Flash)
    } else {
        Err(TranslateError::UnknownThinkingModel(model.to_string()))
    }
}

/// Maximum reasoning tokens for a model family and effort level; -1 leaves
/// the budget to the model, 0 disables thinking where the family allows it.
pub fn thinking_budget(model: &str, level: ThinkLevel) -> Result<i32, TranslateError> {
    let family = model_family(model)?;
    Ok(match (family, level) {
        (ModelFamily::Pro, ThinkLevel::High) => 32768,
        (ModelFamily::Pro, ThinkLevel::Medium) => 16448,
        (ModelFamily::Pro, ThinkLevel::Low) => 128,
        // The pro family cannot disable thinking; 128 is its floor.
        (ModelFamily::Pro, ThinkLevel::None) => 128,
        (ModelFamily::FlashLite, ThinkLevel::High) => 24576,
        (ModelFamily::FlashLite, ThinkLevel::Medium) => 12544,
        (ModelFamily::FlashLite, ThinkLevel::Low) => 512,
        (ModelFamily::FlashLite, ThinkLevel::None) => 0,
        (ModelFamily::Flash, ThinkLevel::High) => 24576,
        (ModelFamily::Flash, ThinkLevel::Medium) => 12288,
        (ModelFamily::Flash, ThinkLevel::Low) => 128,
        (ModelFamily::Flash, ThinkLevel::None) => 0,
        (_, ThinkLevel::Default) => -1,
    })
}

fn include_thoughts(model: &str, level: ThinkLevel) -> bool {
    level != ThinkLevel::None || model.starts_with("gemini-2.5-pro")
}

/// Computes the provider thinking configuration; an explicit budget from
/// the request overrides the table.
pub fn thinking_config(
    model: &str,
    level: ThinkLevel,
    explicit_budget: Option<i32>,
) -> Result<ThinkingConfig, TranslateError> {
    let budget = match explicit_budget {
        Some(budget) => budget,
        None => thinking_budget(model, level)?,
    };
    Ok(ThinkingConfig {
        include_thoughts: include_thoughts(model, level),
        thinking_budget: Some(budget),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_table_per_family_and_level() {
        let cases = [
            ("gemini-2.5-pro", ThinkLevel::High, 32768),
            ("gemini-2.5-pro", ThinkLevel::Medium, 16448),
            ("gemini-2.5-pro", ThinkLevel::Low, 128),
            ("gemini-2.5-pro", ThinkLevel::None, 128),
            ("gemini-2.5-pro", ThinkLevel::Default, -1),
            ("gemini-2.5-flash-lite", ThinkLevel::High, 24576),
            ("gemini-2.5-flash-lite", ThinkLevel::Medium, 12544),
            ("gemini-2.5-flash-lite", ThinkLevel::Low, 512),
            ("gemini-2.5-flash-lite", ThinkLevel::None, 0),
            ("gemini-2.5-flash-lite", ThinkLevel::Default, -1),
            ("gemini-2.5-flash", ThinkLevel::High, 24576),
            ("gemini-2.5-flash", ThinkLevel::Medium, 12288),
            ("gemini-2.5-flash", ThinkLevel::Low, 128),
            ("gemini-2.5-flash", ThinkLevel::None, 0),
            ("gemini-2.5-flash", ThinkLevel::Default, -1),
        ];
        for (model, level, expected) in cases {
            assert_eq!(thinking_budget(model, level).unwrap(), expected, "{model}");
        }
    }

    #[test]
    fn unknown_family_fails() {
        assert_eq!(
            thinking_budget("llama3", ThinkLevel::Low),
            Err(TranslateError::UnknownThinkingModel("llama3".to_string()))
        );
    }

    #[test]
    fn pro_reports_thoughts_even_when_disabled() {
        let config = thinking_config("gemini-2.5-pro", ThinkLevel::None, None).unwrap();
        assert!(config.include_thoughts);
        assert_eq!(config.thinking_budget, Some(128));

        let config = thinking_config("gemini-2.5-flash", ThinkLevel::None, None).unwrap();
        assert!(!config.include_thoughts);
        assert_eq!(config.thinking_budget, Some(0));
    }

    #[test]
    fn explicit_budget_overrides_table() {
        let config = thinking_config("gemini-2.5-flash", ThinkLevel::Low, Some(4096)).unwrap();
        assert_eq!(config.thinking_budget, Some(4096));
    }

    #[test]
    fn levels_parse_from_flag() {
        assert_eq!(
            ThinkLevel::from_flag(&ThinkFlag::Enabled(true)).unwrap(),
            ThinkLevel::Default
        );
        assert_eq!(
            ThinkLevel::from_flag(&ThinkFlag::Enabled(false)).unwrap(),
            ThinkLevel::None
        );
        assert_eq!(ThinkLevel::parse("minimal").unwrap(), ThinkLevel::None);
        assert!(ThinkLevel::parse("extreme").is_err());
    }
}
