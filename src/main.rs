use dotenvy::dotenv;
use oxide_dm_relay::config::{Credentials, Settings};
use oxide_dm_relay::graph::messaging::GraphMessenger;
use oxide_dm_relay::graph::oauth::OAuthExchanger;
use oxide_dm_relay::graph::GraphClient;
use oxide_dm_relay::llm::providers::GroqProvider;
use oxide_dm_relay::pipeline::{ReplyPipeline, RetryPolicy};
use oxide_dm_relay::server::{self, AppState};
use oxide_dm_relay::session::Session;
use oxide_dm_relay::webhook::audit::AuditLog;
use oxide_dm_relay::{browser, tunnel};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    query_secret: Regex,
    groq_key: Regex,
    ngrok_token: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            query_secret: Regex::new(
                r"(access_token|client_secret|fb_exchange_token|code)=[^\s&]+",
            )?,
            groq_key: Regex::new(r"gsk_[A-Za-z0-9]+")?,
            ngrok_token: Regex::new(r"(--authtoken[\s=]+)\S+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.query_secret.replace_all(input, "$1=[MASKED]");
        let output = self.groq_key.replace_all(&output, "[GROQ_KEY]");
        self.ngrok_token
            .replace_all(&output, "$1[MASKED]")
            .to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed in full even if the redacted
        // text has a different length.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Instagram DM relay...");

    let settings = init_settings();
    let credentials = init_credentials(&settings);

    let endpoint = match tunnel::establish(&settings, &credentials.ngrok_auth_token).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            error!("❌ Unable to start ngrok or override URL: {e}");
            std::process::exit(1);
        }
    };

    let session = Arc::new(Session::new(endpoint.url()));
    print_whitelist_banner(&session.redirect_uri());

    let state = build_state(&settings, &credentials, session.clone());

    browser::spawn_open(session.public_url().to_string(), settings.browser_delay());

    let result = server::serve(state, settings.port).await;
    // The tunnel lives until the server has stopped
    drop(endpoint);

    if let Err(e) = result {
        error!("Server startup error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_credentials(settings: &Settings) -> Credentials {
    match settings.credentials() {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

fn build_state(settings: &Settings, credentials: &Credentials, session: Arc<Session>) -> AppState {
    let graph = GraphClient::new(&settings.graph_api_base, settings.http_timeout());

    let oauth = OAuthExchanger::new(
        graph.clone(),
        credentials.facebook_app_id.clone(),
        credentials.facebook_app_secret.clone(),
    );
    let messenger = GraphMessenger::new(graph, session.clone());
    let llm = GroqProvider::new(
        credentials.groq_api_key.clone(),
        &settings.groq_api_base,
        settings.http_timeout(),
    );
    info!("LLM client initialized (model: {}).", settings.groq_model_id);

    let pipeline = ReplyPipeline::new(
        Arc::new(llm),
        Arc::new(messenger),
        settings.groq_model_id.clone(),
        RetryPolicy {
            max_retries: settings.rate_limit_max_retries,
            delay: settings.rate_limit_retry_delay(),
        },
    );

    AppState {
        session,
        oauth: Arc::new(oauth),
        pipeline: Arc::new(pipeline),
        audit_log: Arc::new(AuditLog::new(&settings.webhook_log_path)),
        verify_token: Arc::from(credentials.webhook_verify_token.as_str()),
        signature_secret: settings
            .verify_webhook_signature
            .then(|| Arc::from(credentials.facebook_app_secret.as_str())),
    }
}

fn print_whitelist_banner(redirect_uri: &str) {
    let rule = "=".repeat(80);
    println!("\n{rule}");
    println!("⚠️ ACTION REQUIRED: Add the following URI to Facebook Developer Console");
    println!("👉 URI to whitelist: {redirect_uri}");
    println!("1. Visit: https://developers.facebook.com/apps");
    println!("2. Select your App > Facebook Login > Settings");
    println!("3. Paste the URI into 'Valid OAuth Redirect URIs'");
    println!("4. Save changes, then restart this app.");
    println!("{rule}\n");
}
