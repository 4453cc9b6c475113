// src/config.rs
use crate::constants::{
    BATCH_LIMIT, DEFAULT_API_VERSION, DEFAULT_MAX_POSTS, MAX_DISCOVERY_DEPTH, MAX_DISPATCH_WORKERS,
    QUEUE_CAPACITY,
};
use crate::crawl::job::{Job, JobKind, JobSettings};
use crate::crawl::CrawlSettings;
use crate::error::AppError;
use crate::types::{AccessToken, NodeId, TimeWindow, ValidationError};
use clap::{Parser, ValueEnum};
use indexmap::IndexSet;
use std::path::PathBuf;

/// Environment variable holding the Graph API access token.
pub const ACCESS_TOKEN_ENV: &str = "GRAPH_ACCESS_TOKEN";

/// Default number of dispatch workers: one per core, at most four.
fn default_workers() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// What to crawl from each root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetKind {
    /// A page feed
    Page,
    /// A group feed
    Group,
    /// A single post
    Post,
    /// Pages connected through shared posts and parent references
    Discovery,
}

impl From<TargetKind> for JobKind {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Page => JobKind::PageFeed,
            TargetKind::Group => JobKind::GroupFeed,
            TargetKind::Post => JobKind::Post,
            TargetKind::Discovery => JobKind::Discovery,
        }
    }
}

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Root node ids (page, group or post); one job is started per id
    #[arg(required = true)]
    pub node_ids: Vec<String>,

    /// What to crawl from each root
    #[arg(short, long, value_enum, default_value_t = TargetKind::Page)]
    pub kind: TargetKind,

    /// Stop following a feed after this many posts
    #[arg(long)]
    pub max_posts: Option<u64>,

    /// Discovery levels to traverse away from the root
    #[arg(long, default_value_t = 1)]
    pub max_depth: u8,

    /// Only posts after this time (unix timestamp or date)
    #[arg(long)]
    pub since: Option<String>,

    /// Only posts before this time (unix timestamp or date)
    #[arg(long)]
    pub until: Option<String>,

    /// Number of concurrent dispatch workers (default: auto, max 16)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Sub-requests per batch call (1-50)
    #[arg(long, default_value_t = BATCH_LIMIT)]
    pub batch_size: usize,

    /// Capacity of the pending and response queues
    #[arg(long, default_value_t = QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Directory receiving one sub-directory per job
    #[arg(short, long, default_value = "output")]
    pub output_dir: String,

    /// Graph API version
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolved crawl configuration, validated and ready to start jobs.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub roots: Vec<NodeId>,
    pub kind: JobKind,
    pub access_token: AccessToken,
    pub api_version: String,
    pub job: JobSettings,
    pub crawl: CrawlSettings,
    pub output_dir: PathBuf,
    pub verbose: bool,
}

impl CrawlConfig {
    /// Resolves the configuration from CLI input and environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        let token = std::env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            AppError::MissingConfiguration(format!(
                "{} environment variable not set",
                ACCESS_TOKEN_ENV
            ))
        })?;
        Self::from_parts(cli, AccessToken::new(token)?)
    }

    /// Validates CLI input against an already obtained token.
    pub fn from_parts(cli: CommandLineInput, access_token: AccessToken) -> Result<Self, AppError> {
        let roots = cli
            .node_ids
            .iter()
            .map(|id| NodeId::parse(id))
            .collect::<Result<IndexSet<_>, _>>()?
            .into_iter()
            .collect::<Vec<_>>();
        if roots.is_empty() {
            return Err(ValidationError::EmptyField("node ids").into());
        }

        let batch_size = bounded(cli.batch_size, 1, BATCH_LIMIT)?;
        let workers = bounded(
            cli.workers.unwrap_or_else(default_workers),
            1,
            MAX_DISPATCH_WORKERS,
        )?;
        let queue_capacity = bounded(cli.queue_capacity, 1, u32::MAX as usize)?;
        let max_depth = bounded(cli.max_depth as usize, 0, MAX_DISCOVERY_DEPTH as usize)? as u8;

        let api_version = cli.api_version.trim().trim_matches('/').to_string();
        if api_version.is_empty() {
            return Err(ValidationError::EmptyField("api version").into());
        }

        Ok(CrawlConfig {
            roots,
            kind: cli.kind.into(),
            access_token,
            api_version,
            job: JobSettings {
                max_posts: cli.max_posts.unwrap_or(DEFAULT_MAX_POSTS).max(1),
                max_depth,
                window: TimeWindow::new(cli.since, cli.until)?,
            },
            crawl: CrawlSettings {
                workers,
                batch_size,
                queue_capacity,
            },
            output_dir: PathBuf::from(cli.output_dir),
            verbose: cli.verbose,
        })
    }

    /// One job per root node.
    pub fn build_jobs(&self) -> Vec<Job> {
        self.roots
            .iter()
            .map(|root| Job::new(self.kind, root.clone(), self.job.clone()))
            .collect()
    }
}

fn bounded(value: usize, min: usize, max: usize) -> Result<usize, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfBounds {
            value: value.min(u32::MAX as usize) as u32,
            min: min as u32,
            max: max.min(u32::MAX as usize) as u32,
        })
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            kind: JobKind::PageFeed,
            access_token: AccessToken::new("default_token_for_testing_only")
                .expect("Default access token should be valid"),
            api_version: DEFAULT_API_VERSION.to_string(),
            job: JobSettings::default(),
            crawl: CrawlSettings::default(),
            output_dir: PathBuf::from("output"),
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CommandLineInput {
        CommandLineInput::parse_from(std::iter::once("graphcrawl").chain(args.iter().copied()))
    }

    fn token() -> AccessToken {
        AccessToken::new("EAACEdEose0cBA").unwrap()
    }

    #[test]
    fn defaults_match_the_api_limits() {
        let config = CrawlConfig::from_parts(parse(&["G1", "G2"]), token()).unwrap();
        assert_eq!(config.roots.len(), 2);
        assert_eq!(config.kind, JobKind::PageFeed);
        assert_eq!(config.crawl.batch_size, BATCH_LIMIT);
        assert_eq!(config.crawl.queue_capacity, QUEUE_CAPACITY);
        assert!((1..=4).contains(&config.crawl.workers));
        assert_eq!(config.job.max_depth, 1);
        assert_eq!(config.api_version, "v2.9");
        assert_eq!(config.build_jobs().len(), 2);
    }

    #[test]
    fn repeated_roots_start_one_job() {
        let config = CrawlConfig::from_parts(parse(&["G1", "G2", "G1"]), token()).unwrap();
        let roots: Vec<&str> = config.roots.iter().map(NodeId::as_str).collect();
        assert_eq!(roots, ["G1", "G2"]);
    }

    #[test]
    fn discovery_options_are_carried_into_jobs() {
        let cli = parse(&[
            "--kind",
            "discovery",
            "--max-depth",
            "3",
            "--max-posts",
            "500",
            "--since",
            "2017-01-01",
            "PAGE1",
        ]);
        let config = CrawlConfig::from_parts(cli, token()).unwrap();
        let jobs = config.build_jobs();
        assert_eq!(jobs[0].kind(), JobKind::Discovery);
        assert_eq!(config.job.max_depth, 3);
        assert_eq!(config.job.max_posts, 500);
        assert_eq!(config.job.window.since.as_deref(), Some("2017-01-01"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(CrawlConfig::from_parts(parse(&["--batch-size", "51", "G1"]), token()).is_err());
        assert!(CrawlConfig::from_parts(parse(&["--batch-size", "0", "G1"]), token()).is_err());
        assert!(CrawlConfig::from_parts(parse(&["--workers", "0", "G1"]), token()).is_err());
        assert!(CrawlConfig::from_parts(parse(&["--max-depth", "11", "G1"]), token()).is_err());
        assert!(CrawlConfig::from_parts(parse(&["12/feed"]), token()).is_err());
    }

    #[test]
    fn missing_node_ids_fail_to_parse() {
        assert!(CommandLineInput::try_parse_from(["graphcrawl"]).is_err());
    }
}
