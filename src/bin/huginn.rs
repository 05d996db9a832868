//! Command-line front end for the huginn generation orchestrator.
//!
//! Runs single requests through the full pipeline and exposes the
//! whitelist and model router for inspection.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use huginn::cache::Whitelist;
use huginn::{
    GenerationRequest, HuginnConfig, ModelCriteria, ModelRouter, Priority, ProjectSettings,
    ProviderKind, TaskType,
};

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Generation request orchestrator for survey-answer coding")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one answer through the generation pipeline
    Generate {
        /// Answer text (or omit to read from stdin)
        input: Option<String>,
        /// Task type (coding, translation, context_build, qa_scoring, ...)
        #[arg(short, long, default_value = "general")]
        task: String,
        /// Priority tier (fast, balanced, accurate)
        #[arg(short, long, default_value = "balanced")]
        priority: String,
        /// Append web-search context
        #[arg(long)]
        web_context: bool,
        /// Search on every input, not only ones with capitalised words
        #[arg(long)]
        always_search: bool,
        /// Translate input into the target language first
        #[arg(long)]
        translate: bool,
        /// Rate the output with an evaluator model
        #[arg(long)]
        evaluate: bool,
        /// Target language for translation
        #[arg(long)]
        target_language: Option<String>,
        /// Override the system prompt
        #[arg(long)]
        system: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the brand whitelist
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },

    /// Inspect model routing
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Subcommand)]
enum WhitelistCommand {
    /// Show which whitelist entry (if any) an answer matches
    Check {
        /// Answer text (or omit to read from stdin)
        input: Option<String>,
    },
    /// List all whitelist entries
    List,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List known models with cost, latency and quality
    List,
    /// Model chosen for a task and priority
    Select {
        #[arg(short, long, default_value = "general")]
        task: String,
        #[arg(short, long, default_value = "balanced")]
        priority: String,
    },
    /// Fallback chosen when a model's provider fails
    Fallback {
        model: String,
        #[arg(short, long, default_value = "general")]
        task: String,
    },
    /// Estimated cost in USD for a token count
    Cost {
        model: String,
        #[arg(long, default_value_t = 500)]
        input_tokens: u64,
        #[arg(long, default_value_t = 200)]
        output_tokens: u64,
    },
    /// Recommended batch size for a model
    Batch { model: String },
    /// Best model matching constraints
    Custom {
        /// Max cost per 1M tokens (USD)
        #[arg(long)]
        max_cost: Option<f64>,
        #[arg(long)]
        max_latency_ms: Option<u64>,
        #[arg(long)]
        min_quality: Option<f32>,
        /// Preferred provider (openai, anthropic, google)
        #[arg(long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Generate {
            input,
            task,
            priority,
            web_context,
            always_search,
            translate,
            evaluate,
            target_language,
            system,
            json,
        } => {
            let input = resolve_text(input, "generate")?;
            let config = HuginnConfig::load(args.config.as_deref())?;
            let huginn = config.builder().build()?;

            let settings = ProjectSettings::plain()
                .web_context(web_context)
                .adaptive_search(!always_search)
                .auto_translate(translate)
                .evaluator(evaluate)
                .target_language(
                    target_language.unwrap_or_else(|| config.target_language().to_string()),
                );
            let mut request = GenerationRequest::new(input)
                .task(TaskType::parse(&task))
                .priority(Priority::parse(&priority))
                .settings(settings);
            if let Some(system) = system {
                request = request.system_prompt(system);
            }

            let result = huginn.generate(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.text);
                eprintln!(
                    "model: {} ({}), {} ms, ${:.6}{}",
                    result.model_used,
                    result.provider_used,
                    result.latency_ms,
                    result.cost_usd,
                    if result.from_whitelist {
                        ", whitelist"
                    } else if result.from_cache {
                        ", cached"
                    } else {
                        ""
                    }
                );
                if let Some(eval) = &result.evaluation {
                    eprintln!("evaluation: {:.2} {}", eval.score, eval.comments);
                }
            }
        }

        Command::Whitelist { command } => {
            let whitelist = Whitelist::new();
            match command {
                WhitelistCommand::Check { input } => {
                    let input = resolve_text(input, "whitelist check")?;
                    match whitelist.check(&input) {
                        Some(entry) => println!("{entry}"),
                        None => {
                            println!("no match");
                            std::process::exit(1);
                        }
                    }
                }
                WhitelistCommand::List => {
                    for entry in whitelist.all_entries() {
                        println!("{entry}");
                    }
                }
            }
        }

        Command::Models { command } => {
            let router = ModelRouter::default();
            match command {
                ModelsCommand::List => {
                    for m in router.registry().list() {
                        println!(
                            "{:<28} {:<10} ${:>6.2}/Mtok {:>6} ms  quality {:.1}",
                            m.id,
                            m.provider.as_str(),
                            m.cost_per_1m_tokens,
                            m.avg_latency_ms,
                            m.quality_score
                        );
                    }
                }
                ModelsCommand::Select { task, priority } => {
                    println!(
                        "{}",
                        router.select_model(TaskType::parse(&task), Priority::parse(&priority))
                    );
                }
                ModelsCommand::Fallback { model, task } => {
                    println!(
                        "{}",
                        router.select_fallback_model(&model, TaskType::parse(&task))
                    );
                }
                ModelsCommand::Cost {
                    model,
                    input_tokens,
                    output_tokens,
                } => {
                    println!(
                        "${:.6}",
                        router.estimate_cost(&model, input_tokens, output_tokens)
                    );
                }
                ModelsCommand::Batch { model } => {
                    println!("{}", router.recommended_batch_size(&model));
                }
                ModelsCommand::Custom {
                    max_cost,
                    max_latency_ms,
                    min_quality,
                    provider,
                } => {
                    let mut criteria = ModelCriteria::new();
                    if let Some(cost) = max_cost {
                        criteria = criteria.max_cost(cost);
                    }
                    if let Some(ms) = max_latency_ms {
                        criteria = criteria.max_latency_ms(ms);
                    }
                    if let Some(q) = min_quality {
                        criteria = criteria.min_quality(q);
                    }
                    if let Some(p) = provider {
                        criteria = criteria.preferred_provider(p.parse::<ProviderKind>()?);
                    }
                    println!("{}", router.select_custom_model(&criteria));
                }
            }
        }
    }

    Ok(())
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
