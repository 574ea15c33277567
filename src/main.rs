// Command-line front end for the rewriting proxy.
//
// `rewrite` runs one URL through the proxy endpoint, `concat` serves a batch
// URL; both print the response body to stdout and the status to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kodegen_tools_rewriter::{
    HttpRequest, ReqwestFetcher, RewriterConfig, RewritingProxy, Uri, UriBuilder,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "kodegen-rewriter",
    about = "Rewrite pages and batch resources through the content proxy",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Container whose feature profile applies
    #[arg(long, default_value = "default")]
    container: String,

    /// Bypass caches and emit no-cache links
    #[arg(long)]
    nocache: bool,

    /// Print response headers to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a page or stylesheet and print it rewritten
    Rewrite {
        /// Absolute http(s) URL to fetch
        url: String,
    },
    /// Serve a batch URL, e.g. `/gadgets/concat?type=js&1=http://a/x.js`
    Concat {
        /// Batch request URI
        uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RewriterConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RewriterConfig::default(),
    };

    let fetcher = ReqwestFetcher::from_config(&config).context("building HTTP client")?;
    let proxy = RewritingProxy::new(&config, Arc::new(fetcher))
        .context("configured endpoint paths must be valid URIs")?;

    let uri = match &cli.command {
        Commands::Rewrite { url } => {
            let base = Uri::parse(config.proxy_path()).context("invalid proxy path")?;
            let mut builder = UriBuilder::from_uri(&base);
            builder
                .add_query_parameter("container", &cli.container)
                .add_query_parameter("nocache", if cli.nocache { "1" } else { "0" })
                .add_query_parameter("url", url);
            builder.to_uri()
        }
        Commands::Concat { uri } => {
            Uri::parse(uri).with_context(|| format!("invalid batch URI {uri}"))?
        }
    };

    log::debug!("Serving {uri}");
    let request = HttpRequest::get(uri)
        .with_container(cli.container.clone())
        .with_ignore_cache(cli.nocache);
    let response = proxy.handle(&request).await;

    eprintln!("{}", response.status);
    if cli.verbose {
        for (name, value) in &response.headers {
            eprintln!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
    }
    std::io::stdout()
        .write_all(&response.body)
        .context("writing response body")?;

    if response.status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("request failed with {}", response.status)
    }
}
