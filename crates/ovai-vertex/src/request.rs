use ovai_core::Defaults;
use ovai_protocol::gemini::{
    FunctionDeclaration, GenerateContentRequest, GenerationConfig, Tool,
};
use ovai_protocol::native::{
    ChatRequest, FunctionTool, GenerateRequest, ModelOptions, ThinkFlag,
};
use ovai_protocol::openai::CompletionsRequest;

use crate::error::TranslateError;
use crate::messages::{
    convert_chat_messages, convert_completions_messages, convert_generate_prompt,
};
use crate::thinking::{ThinkLevel, thinking_config};

pub fn generate_suffix(model: &str) -> String {
    format!("{model}:generateContent")
}

pub fn stream_suffix(model: &str) -> String {
    format!("{model}:streamGenerateContent?alt=sse")
}

pub fn predict_suffix(model: &str) -> String {
    format!("{model}:predict")
}

pub fn model_url(defaults: &Defaults, project_id: &str, suffix: &str) -> String {
    format!(
        "https://{}/v1/projects/{}/locations/{}/publishers/google/models/{}",
        defaults.api_endpoint, project_id, defaults.api_location, suffix
    )
}

fn merge_options(config: &mut GenerationConfig, options: &ModelOptions) {
    if options.num_predict.is_some() {
        config.max_output_tokens = options.num_predict;
    }
    if options.temperature.is_some() {
        config.temperature = options.temperature;
    }
    if options.top_p.is_some() {
        config.top_p = options.top_p;
    }
    if options.top_k.is_some() {
        config.top_k = options.top_k;
    }
}

fn merge_think_flag(
    config: &mut GenerationConfig,
    model: &str,
    think: Option<&ThinkFlag>,
) -> Result<(), TranslateError> {
    if let Some(flag) = think {
        let level = ThinkLevel::from_flag(flag)?;
        config.thinking_config = Some(thinking_config(model, level, None)?);
    }
    Ok(())
}

/// Converts declared tools into the provider's functionDeclarations group.
pub fn convert_tools(tools: &[FunctionTool]) -> Option<Vec<Tool>> {
    if tools.is_empty() {
        return None;
    }
    let declarations = tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: tool.function.parameters.clone(),
        })
        .collect();
    Some(vec![Tool {
        function_declarations: Some(declarations),
    }])
}

pub fn generate_body(
    input: &GenerateRequest,
    defaults: &Defaults,
) -> Result<GenerateContentRequest, TranslateError> {
    let contents = convert_generate_prompt(input)?;
    let mut config = defaults.gemini_defaults.generation_config.clone();
    merge_options(&mut config, &input.options);
    merge_think_flag(&mut config, &input.model, input.think.as_ref())?;
    Ok(GenerateContentRequest {
        contents,
        generation_config: config,
        safety_settings: defaults.gemini_defaults.safety_settings.clone(),
        tools: None,
    })
}

pub fn chat_body(
    input: &ChatRequest,
    defaults: &Defaults,
) -> Result<GenerateContentRequest, TranslateError> {
    let contents = convert_chat_messages(&input.messages)?;
    let mut config = defaults.gemini_defaults.generation_config.clone();
    merge_options(&mut config, &input.options);
    merge_think_flag(&mut config, &input.model, input.think.as_ref())?;
    Ok(GenerateContentRequest {
        contents,
        generation_config: config,
        safety_settings: defaults.gemini_defaults.safety_settings.clone(),
        tools: convert_tools(&input.tools),
    })
}

pub fn completions_body(
    input: &CompletionsRequest,
    defaults: &Defaults,
) -> Result<GenerateContentRequest, TranslateError> {
    let contents = convert_completions_messages(&input.messages)?;
    let mut config = defaults.gemini_defaults.generation_config.clone();
    if input.max_tokens.is_some() {
        config.max_output_tokens = input.max_tokens;
    }
    if input.max_completion_tokens.is_some() {
        config.max_output_tokens = input.max_completion_tokens;
    }
    if input.temperature.is_some() {
        config.temperature = input.temperature;
    }
    if input.top_p.is_some() {
        config.top_p = input.top_p;
    }
    if !input.reasoning_effort.is_empty() {
        let level = ThinkLevel::parse(&input.reasoning_effort)?;
        config.thinking_config = Some(thinking_config(
            &input.model,
            level,
            input.thinking_budget,
        )?);
    }
    Ok(GenerateContentRequest {
        contents,
        generation_config: config,
        safety_settings: defaults.gemini_defaults.safety_settings.clone(),
        tools: convert_tools(&input.tools),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Defaults {
        let mut defaults = Defaults::default();
        defaults.api_endpoint = "us-central1-aiplatform.googleapis.com".to_string();
        defaults.api_location = "us-central1".to_string();
        defaults.gemini_defaults.generation_config.max_output_tokens = Some(8192);
        defaults.gemini_defaults.generation_config.temperature = Some(0.9);
        defaults
    }

    #[test]
    fn url_targets_the_project_model_and_verb() {
        assert_eq!(
            model_url(
                &defaults(),
                "my-project",
                &generate_suffix("gemini-2.5-flash")
            ),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/publishers/google/models/gemini-2.5-flash:generateContent"
        );
        assert!(stream_suffix("m").ends_with(":streamGenerateContent?alt=sse"));
        assert!(predict_suffix("m").ends_with(":predict"));
    }

    #[test]
    fn generate_merges_options_over_defaults() {
        let input: GenerateRequest = serde_json::from_str(
            r#"{"model":"gemini-2.5-flash","prompt":"hi","options":{"temperature":0.1,"top_k":16}}"#,
        )
        .unwrap();
        let body = generate_body(&input, &defaults()).unwrap();
        assert_eq!(body.generation_config.temperature, Some(0.1));
        assert_eq!(body.generation_config.top_k, Some(16));
        assert_eq!(body.generation_config.max_output_tokens, Some(8192));
        assert!(body.tools.is_none());
    }

    #[test]
    fn chat_think_level_sets_thinking_config() {
        let input: ChatRequest = serde_json::from_str(
            r#"{"model":"gemini-2.5-pro","messages":[{"role":"user","content":"q"}],"think":"low"}"#,
        )
        .unwrap();
        let body = chat_body(&input, &defaults()).unwrap();
        let thinking = body.generation_config.thinking_config.unwrap();
        assert!(thinking.include_thoughts);
        assert_eq!(thinking.thinking_budget, Some(128));
    }

    #[test]
    fn completions_defaults_to_medium_effort() {
        let input: CompletionsRequest = serde_json::from_str(
            r#"{"model":"gemini-2.5-flash","messages":[{"role":"user","content":"q"}]}"#,
        )
        .unwrap();
        let body = completions_body(&input, &defaults()).unwrap();
        let thinking = body.generation_config.thinking_config.unwrap();
        assert!(thinking.include_thoughts);
        assert_eq!(thinking.thinking_budget, Some(12288));
    }

    #[test]
    fn completions_max_completion_tokens_wins() {
        let input: CompletionsRequest = serde_json::from_str(
            r#"{"model":"gemini-2.5-flash","messages":[{"role":"user","content":"q"}],"max_tokens":100,"max_completion_tokens":200}"#,
        )
        .unwrap();
        let body = completions_body(&input, &defaults()).unwrap();
        assert_eq!(body.generation_config.max_output_tokens, Some(200));
    }

    #[test]
    fn declared_tools_become_function_declarations() {
        let input: ChatRequest = serde_json::from_str(
            r#"{"model":"gemini-2.5-flash","messages":[{"role":"user","content":"q"}],"tools":[{"type":"function","function":{"name":"get_time","description":"now","parameters":{"type":"object"}}}]}"#,
        )
        .unwrap();
        let body = chat_body(&input, &defaults()).unwrap();
        let tools = body.tools.unwrap();
        let declarations = tools[0].function_declarations.as_ref().unwrap();
        assert_eq!(declarations[0].name, "get_time");
    }
}
