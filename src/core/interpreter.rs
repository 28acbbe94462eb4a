use crate::core::config::InterpreterConfig;
use crate::core::error::{AtStage, CortexError, InterpretError, Stage};
use crate::parser::{CommandList, Confidence, ResponseParser};
use crate::prompt::PromptBuilder;
use crate::providers::factory::ProviderSpec;
use crate::providers::{GenerationParams, LLMProvider, Provider, ProviderFactory};
use crate::system::SystemContext;
use crate::validator::{CommandValidator, ValidationOutcome, ValidationPolicy};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Result of one interpretation: the surviving commands plus whatever the validator dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub commands: CommandList,
    pub dropped: Vec<ValidationOutcome>,
}

/// Turns a natural-language request into an ordered, vetted list of shell commands.
///
/// Holds no per-request state: every call builds a prompt, makes exactly one provider request,
/// parses the reply and (optionally) validates it. A single instance can serve concurrent
/// calls.
pub struct CommandInterpreter {
    provider: Box<dyn LLMProvider>,
    params: GenerationParams,
    prompts: PromptBuilder,
    parser: ResponseParser,
    validator: CommandValidator,
    policy: ValidationPolicy,
}

impl CommandInterpreter {
    /// Builds the provider adapter named by `config`.
    pub fn new(config: InterpreterConfig) -> Result<Self, InterpretError> {
        let validator = build_validator(&config).at(Stage::Setup)?;
        let params = generation_params(&config);
        let InterpreterConfig {
            api_key,
            provider,
            base_url,
            timeout,
            policy,
            lenient_parsing,
            ..
        } = config;

        let adapter = ProviderFactory::create(ProviderSpec {
            provider,
            api_key,
            base_url,
            timeout,
        })
        .at(Stage::Setup)?;

        info!(%provider, model = %params.model, ?policy, "Interpreter ready");
        Ok(Self {
            provider: adapter,
            params,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(lenient_parsing),
            validator,
            policy,
        })
    }

    /// Uses an already constructed adapter. The credential in `config` is not used.
    pub fn with_provider(
        config: InterpreterConfig,
        provider: Box<dyn LLMProvider>,
    ) -> Result<Self, InterpretError> {
        let validator = build_validator(&config).at(Stage::Setup)?;
        Ok(Self {
            params: generation_params(&config),
            provider,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(config.lenient_parsing),
            validator,
            policy: config.policy,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider.provider()
    }

    pub fn model(&self) -> &str {
        &self.params.model
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Commands for `user_input` without host information.
    pub async fn parse(
        &self,
        user_input: &str,
        validate: bool,
    ) -> Result<CommandList, InterpretError> {
        Ok(self.run(user_input, None, validate).await?.commands)
    }

    /// Commands for `user_input`, tailored to `context`.
    pub async fn parse_with_context(
        &self,
        user_input: &str,
        context: &SystemContext,
        validate: bool,
    ) -> Result<CommandList, InterpretError> {
        Ok(self.run(user_input, Some(context), validate).await?.commands)
    }

    /// Like [`parse_with_context`](Self::parse_with_context) but also reports dropped commands.
    pub async fn interpret(
        &self,
        user_input: &str,
        context: Option<&SystemContext>,
        validate: bool,
    ) -> Result<Interpretation, InterpretError> {
        self.run(user_input, context, validate).await
    }

    async fn run(
        &self,
        user_input: &str,
        context: Option<&SystemContext>,
        validate: bool,
    ) -> Result<Interpretation, InterpretError> {
        if user_input.trim().is_empty() {
            return Err(InterpretError::new(
                Stage::Prompt,
                CortexError::Input("Request must not be empty".to_string()),
            ));
        }

        let prompt = match context {
            Some(context) => self.prompts.build_with_context(user_input, context),
            None => self.prompts.build(user_input),
        };

        let provider = self.provider.provider();
        debug!(%provider, model = %self.params.model, "Sending request");
        let started = Instant::now();
        let raw = self
            .provider
            .generate(&prompt, &self.params)
            .await
            .at(Stage::Provider)?;
        debug!(
            %provider,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider responded"
        );
        trace!(response = %raw, "Raw provider response");

        let commands = self.parser.parse(&raw).at(Stage::Parse)?;
        if commands.confidence() == Confidence::Fallback {
            warn!(
                count = commands.len(),
                "Response did not follow the JSON contract; commands were scraped from text"
            );
        }

        if !validate {
            return Ok(Interpretation {
                commands,
                dropped: Vec::new(),
            });
        }

        let (commands, dropped) = self
            .validator
            .apply(commands, self.policy)
            .at(Stage::Validate)?;
        debug!(kept = commands.len(), dropped = dropped.len(), "Validation done");
        Ok(Interpretation { commands, dropped })
    }
}

fn build_validator(config: &InterpreterConfig) -> Result<CommandValidator, CortexError> {
    CommandValidator::with_extra_rules(
        config
            .extra_rules
            .iter()
            .map(|(id, pattern)| (id.as_str(), pattern.as_str())),
    )
}

fn generation_params(config: &InterpreterConfig) -> GenerationParams {
    GenerationParams {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}
