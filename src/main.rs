// src/main.rs

use clap::Parser;
use graphcrawl::{
    AppError, CommandLineInput, CrawlConfig, CrawlReport, Crawler, GraphHttpClient,
    JsonLinesSinkFactory,
};
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::sync::Arc;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("graphcrawl.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] {T} - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] {T} - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Runs every configured job to completion or until Ctrl-C.
async fn execute_crawl(config: &CrawlConfig) -> Result<CrawlReport, AppError> {
    let transport = GraphHttpClient::new(config.access_token.clone(), &config.api_version)?;
    log::info!("Using Graph API at {}", transport.endpoint());

    let sinks = JsonLinesSinkFactory::new(&config.output_dir);
    let crawler = Crawler::new(Arc::new(transport), Arc::new(sinks), config.crawl);

    let cancel = crawler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping the crawl");
            cancel.cancel();
        }
    });

    crawler.run(config.build_jobs()).await
}

/// Prints the outcome to the user.
fn report_completion(config: &CrawlConfig, report: &CrawlReport) {
    for job in &report.finished {
        println!("✓ {} finished: {}", job.id, job.stats);
    }
    for job in &report.unfinished {
        eprintln!("⚠️  {} stopped early: {}", job.id, job.stats);
    }
    if report.requests_lost > 0 {
        eprintln!(
            "⚠️  {} requests were lost to failed batch calls.",
            report.requests_lost
        );
    }
    println!(
        "📄 {} batch calls, {} requests. Output in {}",
        report.batches_sent,
        report.requests_sent,
        config.output_dir.display()
    );
}

#[tokio::main]
async fn main() {
    let cli = CommandLineInput::parse();

    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match CrawlConfig::resolve(cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match execute_crawl(&config).await {
        Ok(report) => {
            report_completion(&config, &report);
            if !report.is_complete() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            log::error!("Crawl failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
