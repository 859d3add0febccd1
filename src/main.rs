use clap::Parser;
use page_trail::output::save_document;
use page_trail::renderer::RendererFactory;
use page_trail::renderer::webdriver::{WebDriverFactory, WebDriverSettings};
use page_trail::server::{self, AppState};
use page_trail::utils::format_duration;
use page_trail::{CrawlResult, CrawlerConfig, PageRecord, PageTrail, merge};
use std::sync::Arc;

mod args;
use args::{ApiArgs, Args, CliArgs, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let result = match args.command {
        Command::Cli(cli) => run_cli(cli).await,
        Command::Api(api) => run_api(api).await,
    };

    if let Err(e) = result {
        ::log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run_cli(args: CliArgs) -> CrawlResult<()> {
    let mut config = CrawlerConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate()?;

    println!("Note: crawling requires a WebDriver server (e.g. ChromeDriver or geckodriver).");
    println!(
        "Set WEBDRIVER_URL if not using the default {}",
        config.webdriver_url
    );

    let start_time = std::time::Instant::now();
    let mut saved = 0;

    for url in &args.urls {
        ::log::info!("Starting crawl of {}", url);

        let mut rx = match PageTrail::new(url)
            .with_config(config.clone())
            .with_pagination(!args.no_pagination)
            .generate()
        {
            Ok(rx) => rx,
            Err(e) => {
                ::log::error!("Failed to start crawl of {}: {}", url, e);
                continue;
            }
        };

        // Process pages as they come in
        let mut pages = Vec::new();
        while let Some(page) = rx.recv().await {
            process_page(&page, pages.len() + 1);
            pages.push(page);
        }

        let Some(document) = merge(&pages) else {
            ::log::error!("No content extracted from {}", url);
            continue;
        };

        match save_document(&document, &config.output_dir, &config.output_formats) {
            Ok(paths) => {
                saved += 1;
                for (format, path) in paths {
                    println!("{} [{}] -> {}", url, format, path.display());
                }
            }
            Err(e) => ::log::error!("Failed to save document for {}: {}", url, e),
        }
    }

    ::log::info!(
        "Crawling complete - saved {} of {} documents in {}",
        saved,
        args.urls.len(),
        format_duration(start_time.elapsed())
    );
    Ok(())
}

async fn run_api(args: ApiArgs) -> CrawlResult<()> {
    let mut config = CrawlerConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate()?;

    let factory: Arc<dyn RendererFactory> =
        Arc::new(WebDriverFactory::new(WebDriverSettings::from(&config)));
    let state = AppState::new(factory, config.crawl_options(), config.max_concurrency);

    server::serve(state, &config.api_host, config.api_port).await
}

fn process_page(page: &PageRecord, count: usize) {
    ::log::info!("Processed page {}: {}", count, page.url());
    ::log::debug!(
        "Page has {} fragments and {} links",
        page.fragments().len(),
        page.links().len()
    );
}
