//! Fetches user profiles through a flaky simulated transport.
//!
//! The pipeline uses the stock settings: 4 attempts with 2s/4s/8s backoff,
//! 10s per attempt, a breaker that opens after 3 consecutive failures for
//! 30s, and a bulkhead of 10 running plus 5 queued calls. Time is virtual,
//! so the example finishes instantly.
//!
//! Run with `cargo run -p guardrail --example user_profile --features tracing`.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guardrail::{
    AttemptContext, ErrorClass, FallbackResolver, FnClassifier, PipelineBuilder,
    PipelineSettings, Resolved, TracingObserver,
};

#[derive(Debug, Clone, PartialEq)]
struct UserProfile {
    id: u32,
    name: String,
}

impl UserProfile {
    fn guest() -> Self {
        Self {
            id: 0,
            name: "guest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransportError {
    Status(u16),
    Reset,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(code) => write!(f, "HTTP {code}"),
            TransportError::Reset => write!(f, "connection reset"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    fn class(&self) -> ErrorClass {
        match self {
            TransportError::Status(code) if *code < 500 => ErrorClass::Fatal,
            _ => ErrorClass::Transient,
        }
    }
}

/// Answers according to a script, one entry per request, then succeeds.
struct FlakyTransport {
    script: Vec<Result<Duration, TransportError>>,
    requests: AtomicU32,
}

impl FlakyTransport {
    fn new(script: Vec<Result<Duration, TransportError>>) -> Self {
        Self {
            script,
            requests: AtomicU32::new(0),
        }
    }

    async fn get_profile(
        &self,
        id: u32,
        ctx: AttemptContext,
    ) -> Result<UserProfile, TransportError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) as usize;
        let step = self
            .script
            .get(n)
            .copied()
            .unwrap_or(Ok(Duration::from_millis(20)));
        println!("  -> GET /users/{id} (attempt {})", ctx.attempt());
        let latency = step?;
        tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(TransportError::Reset),
            _ = tokio::time::sleep(latency) => Ok(UserProfile {
                id,
                name: format!("user-{id}"),
            }),
        }
    }
}

#[tokio::main(flavor = "current_thread", start_paused = true)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let settings = PipelineSettings {
        target: "users-api".to_string(),
        ..PipelineSettings::default()
    };
    let pipeline = PipelineBuilder::<UserProfile, TransportError>::from_settings(&settings)
        .classifier(FnClassifier::new(TransportError::class))
        .fallback(FallbackResolver::builder().value(UserProfile::guest()))
        .observer(TracingObserver)
        .build()?;

    println!("1. two 503s, then a response");
    let transport = Arc::new(FlakyTransport::new(vec![
        Err(TransportError::Status(503)),
        Err(TransportError::Status(503)),
    ]));
    let started = tokio::time::Instant::now();
    let profile = pipeline
        .execute(|ctx: AttemptContext| {
            let transport = Arc::clone(&transport);
            async move { transport.get_profile(42, ctx).await }
        })
        .await?;
    println!("   {profile:?} after {:?}\n", started.elapsed());

    println!("2. a slow response hits the 10s timeout once");
    let transport = Arc::new(FlakyTransport::new(vec![Ok(Duration::from_secs(60))]));
    let profile = pipeline
        .execute(|ctx: AttemptContext| {
            let transport = Arc::clone(&transport);
            async move { transport.get_profile(7, ctx).await }
        })
        .await?;
    println!("   {profile:?}\n");

    println!("3. 404 is not retried and resolves to the fallback");
    let transport = Arc::new(FlakyTransport::new(vec![Err(TransportError::Status(404))]));
    let profile = pipeline
        .execute(|ctx: AttemptContext| {
            let transport = Arc::clone(&transport);
            async move { transport.get_profile(9, ctx).await }
        })
        .await?;
    println!("   {profile:?}\n");

    println!("4. the dependency goes down and the breaker opens");
    let transport = Arc::new(FlakyTransport::new(vec![Err(TransportError::Reset); 16]));
    for id in 1..=2 {
        let resolved = pipeline
            .execute(|ctx: AttemptContext| {
                let transport = Arc::clone(&transport);
                async move { transport.get_profile(id, ctx).await }
            })
            .await?;
        match resolved {
            Resolved::Success(profile) => println!("   {profile:?}"),
            Resolved::Fallback { value, cause } => {
                println!("   fallback {:?} because {cause}", value.name)
            }
        }
    }
    if let Some(breaker) = pipeline.circuit_breaker() {
        println!("   breaker is {}", breaker.state().as_str());
    }

    Ok(())
}
