use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use lib_mbg_sentiment::encoder::Vocabulary;
use lib_mbg_sentiment::preprocessing::TextNormalizer;
use lib_mbg_sentiment::{Analysis, AnalysisError, Analyzer, AnalyzerConfig, KeywordLexicon, ModelVariant};

#[derive(Parser, Debug)]
#[command(
    name = "mbg-sentiment",
    version,
    about = "Sentiment of Indonesian opinions on the free school-meal program"
)]
struct Cli {
    #[arg(long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory holding model weights and tokenizer.bin")]
    artifact_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[arg(short, long, global = true, help = "Log pipeline steps")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify one text
    Analyze {
        text: String,
        #[arg(long, short, help = "LSTM, BI-LSTM or GRU")]
        model: Option<ModelVariant>,
    },
    /// Classify every row of a CSV file
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "text")]
        column: String,
        #[arg(long, help = "Write results here instead of stdout")]
        output: Option<PathBuf>,
        #[arg(long, short)]
        model: Option<ModelVariant>,
    },
    /// Build tokenizer.bin from the normalized texts of a CSV file
    BuildVocab {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "text")]
        column: String,
        #[arg(long)]
        num_words: Option<usize>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the keyword lexicon
    Lexicon,
}

#[derive(Serialize)]
struct BatchRow<'a> {
    text: &'a str,
    label: String,
    score: String,
    keyword_score: String,
    model_score: String,
    positive_hits: String,
    negative_hits: String,
    warnings: String,
    error: String,
}

impl<'a> BatchRow<'a> {
    fn new(text: &'a str, result: &lib_mbg_sentiment::Result<Analysis>) -> Self {
        match result {
            Ok(analysis) => Self {
                text,
                label: analysis.label().to_string(),
                score: format!("{:.4}", analysis.score()),
                keyword_score: format!("{:.4}", analysis.combined.keyword_score),
                model_score: analysis.combined.model_score.map(|s| format!("{:.4}", s)).unwrap_or_default(),
                positive_hits: analysis.keywords.positive_hits.join(";"),
                negative_hits: analysis.keywords.negative_hits.join(";"),
                warnings: analysis.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(";"),
                error: String::new(),
            },
            Err(e) => Self {
                text,
                label: String::new(),
                score: String::new(),
                keyword_score: String::new(),
                model_score: String::new(),
                positive_hits: String::new(),
                negative_hits: String::new(),
                warnings: String::new(),
                error: e.to_string(),
            },
        }
    }
}

fn main() -> ExitCode {
    let cli: Cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level: &str = if verbose { "debug" } else { "warn" };
    let filter: EnvFilter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AnalyzerConfig, AnalysisError> {
    let mut config: AnalyzerConfig = match &cli.config {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(dir) = &cli.artifact_dir {
        config.artifact_dir = dir.clone();
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), AnalysisError> {
    let config: AnalyzerConfig = load_config(cli)?;

    match &cli.command {
        Commands::Analyze { text, model } => {
            let analyzer: Analyzer = Analyzer::from_config(&config)?;
            let variant: ModelVariant = model.unwrap_or(config.default_model);
            let analysis: Analysis = analyzer.analyze(text, variant)?;
            if cli.json {
                print_json(&analysis)?;
            } else {
                print_analysis(&analysis);
            }
        }
        Commands::Batch { input, column, output, model } => {
            let analyzer: Analyzer = Analyzer::from_config(&config)?;
            let variant: ModelVariant = model.unwrap_or(config.default_model);
            let texts: Vec<String> = read_column(input, column)?;
            let results: Vec<lib_mbg_sentiment::Result<Analysis>> = analyzer.analyze_batch(&texts, variant);

            let sink: Box<dyn Write> = match output {
                Some(path) => Box::new(std::fs::File::create(path).map_err(|e| AnalysisError::Io {
                    path: path.clone(),
                    source: e,
                })?),
                None => Box::new(std::io::stdout()),
            };
            let mut writer: csv::Writer<Box<dyn Write>> = csv::Writer::from_writer(sink);
            for (text, result) in texts.iter().zip(&results) {
                writer.serialize(BatchRow::new(text, result))?;
            }
            writer.flush().map_err(|e| AnalysisError::Io { path: PathBuf::from("<output>"), source: e })?;

            let failed: usize = results.iter().filter(|r| r.is_err()).count();
            tracing::info!(rows = results.len(), failed, "batch complete");
        }
        Commands::BuildVocab { input, column, num_words, output } => {
            let normalizer: TextNormalizer = TextNormalizer::indonesian()?;
            let texts: Vec<String> = read_column(input, column)?;
            let cleaned: Vec<String> = texts
                .iter()
                .map(|t| normalizer.normalize(t).map(|n| n.text))
                .collect::<Result<Vec<String>, AnalysisError>>()?;
            let vocabulary: Vocabulary = Vocabulary::fit(&cleaned, *num_words);
            vocabulary.save(output)?;
            if cli.json {
                print_json(&serde_json::json!({ "words": vocabulary.len(), "output": output }))?;
            } else {
                println!("wrote {} words to {}", vocabulary.len(), output.display());
            }
        }
        Commands::Lexicon => {
            let analyzer: Analyzer = Analyzer::from_config(&config)?;
            let lexicon: &KeywordLexicon = analyzer.lexicon();
            if cli.json {
                print_json(&serde_json::json!({
                    "positive": lexicon.positive(),
                    "negative": lexicon.negative(),
                }))?;
            } else {
                println!("Positif: {}", lexicon.positive().join(", "));
                println!("Negatif: {}", lexicon.negative().join(", "));
            }
        }
    }
    Ok(())
}

fn read_column(path: &Path, column: &str) -> Result<Vec<String>, AnalysisError> {
    let mut reader: csv::Reader<std::fs::File> = csv::Reader::from_path(path)?;
    let index: usize = reader
        .headers()?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| AnalysisError::Config(format!("column '{}' not found in {}", column, path.display())))?;

    let mut texts: Vec<String> = Vec::new();
    for record in reader.records() {
        texts.push(record?.get(index).unwrap_or_default().to_string());
    }
    Ok(texts)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnalysisError> {
    let rendered: String = serde_json::to_string_pretty(value).map_err(|e| AnalysisError::Config(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    for warning in &analysis.warnings {
        println!("warning: {}", warning);
    }
    println!("Sentimen: {}", analysis.label());
    println!("Skor: {:.2}%", analysis.score() * 100.0);
    println!("Model: {}", analysis.variant);
    match analysis.combined.model_score {
        Some(score) => println!("Skor model: {:.4}", score),
        None => println!("Skor model: -"),
    }
    println!("Skor kata kunci: {:.4} ({})", analysis.combined.keyword_score, analysis.combined.keyword_sentiment);
    if !analysis.keywords.positive_hits.is_empty() {
        println!("Kata positif: {}", analysis.keywords.positive_hits.join(", "));
    }
    if !analysis.keywords.negative_hits.is_empty() {
        println!("Kata negatif: {}", analysis.keywords.negative_hits.join(", "));
    }
    if let Some(processed) = &analysis.processed {
        println!("Hasil preprocessing: {}", processed.text);
    }
    let top: Vec<String> = analysis
        .word_frequencies()
        .into_iter()
        .take(10)
        .map(|(word, count)| format!("{}({})", word, count))
        .collect();
    if !top.is_empty() {
        println!("Kata teratas: {}", top.join(" "));
    }
}
