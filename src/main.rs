use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use aippt::{
    analyzer::{analyze_all_templates, save_metadata},
    config::Config,
    create_llm_client,
    outline::slides_from_values,
    server::{self, AppState},
    analyze_template, ImageService, KnowledgeRetriever, LlmConfig, NoTemplateGenerator,
    OutlineGenerator, OutlineRequest, PptError, SlideContent, TemplateFiller,
};

#[derive(Parser, Debug)]
#[command(name = "aippt", version, about = "Generate PowerPoint decks from LLM outlines")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Analyse a template, or every template in a directory, and write the JSON sidecars.
    Analyze {
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,
    },
    /// Fill a template with an outline.
    Fill {
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,
        #[arg(value_name = "OUTLINE")]
        outline: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a deck from an outline without a template.
    Generate {
        #[arg(value_name = "OUTLINE")]
        outline: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Ask the LLM for an outline and print it as JSON.
    Outline {
        #[arg(value_name = "TOPIC")]
        topic: String,
        /// Page count, or 精简 / 详细.
        #[arg(long, default_value = "8")]
        pages: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        deep_think: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Reads an outline file: a JSON array, or an object with an `outline` array.
fn read_outline(path: &Path) -> Result<Vec<SlideContent>, PptError> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let slides = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("outline") {
            Some(Value::Array(items)) => items,
            _ => return Err(PptError::Parse("expected an `outline` array".to_string())),
        },
        _ => return Err(PptError::Parse("expected a JSON array of slides".to_string())),
    };
    Ok(slides_from_values(&slides))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Command::Serve => {
            let state = Arc::new(AppState::from_config(config)?);
            server::serve(state).await?;
        }
        Command::Analyze { template } if template.is_dir() => {
            let analysed = analyze_all_templates(&template)?;
            for metadata in &analysed {
                eprintln!("Analysed: {} ({} slides)", metadata.name, metadata.slide_count);
            }
            eprintln!("Metadata written for {} templates", analysed.len());
        }
        Command::Analyze { template } => {
            let metadata = analyze_template(&template)?;
            let sidecar = save_metadata(&template, &metadata)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            eprintln!("Metadata written to: {}", sidecar.display());
        }
        Command::Fill {
            template,
            outline,
            output,
        } => {
            let slides = read_outline(&outline)?;
            let images = Arc::new(ImageService::new(config.image_config()));
            let report = TemplateFiller::new(images)
                .fill(&template, &slides, &output)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            eprintln!("Successfully wrote: {}", output.display());
        }
        Command::Generate { outline, output } => {
            let slides = read_outline(&outline)?;
            let images = Arc::new(ImageService::new(config.image_config()));
            NoTemplateGenerator::new(images)
                .generate(&slides, &output)
                .await?;
            eprintln!("Successfully wrote: {}", output.display());
        }
        Command::Outline {
            topic,
            pages,
            subject,
            deep_think,
            output,
        } => {
            let key = config
                .llm_key()
                .ok_or_else(|| PptError::Llm("ALIYUN_API_KEY is not set".to_string()))?;
            let llm = create_llm_client(
                &config.llm_base_url,
                key,
                &config.llm_model,
                LlmConfig::default(),
            );
            let generator = OutlineGenerator::new(llm)
                .with_knowledge(Arc::new(KnowledgeRetriever::load(&config.knowledge_dir)))
                .with_template_dir(&config.template_dir);
            let request = OutlineRequest {
                pages: Value::String(pages),
                subject,
                deep_think,
                ..OutlineRequest::new(topic)
            };
            let slides = generator.generate(&request).await?;
            let json = serde_json::to_string_pretty(&slides)?;
            match output {
                Some(path) => {
                    fs::write(&path, &json)
                        .map_err(|e| format!("Failed to write to '{}': {}", path.display(), e))?;
                    eprintln!("Successfully wrote: {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}
