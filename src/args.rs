use clap::{Parser, Subcommand, ValueEnum};
use page_trail::CrawlerConfig;
use page_trail::config::BrowserKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "page-trail")]
#[command(about = "Extracts web pages, following pagination, into merged documents")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl URLs and save the merged documents
    Cli(CliArgs),
    /// Run the HTTP API server
    Api(ApiArgs),
}

#[derive(clap::Args, Debug)]
pub struct CliArgs {
    /// Start URLs to crawl
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Browser to drive (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub browser: Option<BrowserArg>,

    /// Show the browser window
    #[arg(long)]
    pub no_headless: bool,

    /// Only fetch the start page of each URL
    #[arg(long)]
    pub no_pagination: bool,

    /// Maximum number of pages per URL
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the saved documents
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ApiArgs {
    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BrowserArg {
    Chrome,
    Firefox,
}

/// Convert from CLI argument browser to internal browser kind
pub fn convert_browser(arg: BrowserArg) -> BrowserKind {
    match arg {
        BrowserArg::Chrome => BrowserKind::Chrome,
        BrowserArg::Firefox => BrowserKind::Firefox,
    }
}

impl CliArgs {
    /// Applies the command-line settings on top of `config`
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        if let Some(browser) = self.browser {
            config.browser = convert_browser(browser);
        }
        if self.no_headless {
            config.headless = false;
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
    }
}

impl ApiArgs {
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        if let Some(host) = &self.host {
            config.api_host = host.clone();
        }
        if let Some(port) = self.port {
            config.api_port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_subcommand() {
        let args = Args::try_parse_from([
            "page-trail",
            "cli",
            "https://example.com/a",
            "https://example.com/b",
            "--browser",
            "firefox",
            "--no-headless",
            "--max-depth",
            "3",
        ])
        .unwrap();

        let Command::Cli(cli) = args.command else {
            panic!("expected cli subcommand");
        };
        assert_eq!(cli.urls.len(), 2);
        assert!(!cli.no_pagination);

        let mut config = CrawlerConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.browser, BrowserKind::Firefox);
        assert!(!config.headless);
        assert_eq!(config.max_depth, 3);
    }

    #[test]
    fn test_cli_requires_urls() {
        assert!(Args::try_parse_from(["page-trail", "cli"]).is_err());
    }

    #[test]
    fn test_api_subcommand() {
        let args = Args::try_parse_from(["page-trail", "api", "--port", "8080"]).unwrap();
        let Command::Api(api) = args.command else {
            panic!("expected api subcommand");
        };

        let mut config = CrawlerConfig::default();
        api.apply_to(&mut config);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.api_host, "0.0.0.0");
    }
}
