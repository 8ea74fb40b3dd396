use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Something that can be polled for readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Ready when a GET returns one of the accepted status codes.
    Http { url: String, accept: Vec<u16> },
    /// Ready when the command exits with status 0.
    Command { program: String, args: Vec<String> },
}

impl ProbeTarget {
    pub fn http(url: impl Into<String>, accept: &[u16]) -> Self {
        Self::Http {
            url: url.into(),
            accept: accept.to_vec(),
        }
    }

    /// Build a command target from an argv list. `None` when the list is empty.
    pub fn command(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::Command {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { url, .. } => f.write_str(url),
            Self::Command { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    pub target: ProbeTarget,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl ReadinessCheck {
    pub fn new(target: ProbeTarget, interval: Duration, max_attempts: u32) -> Self {
        Self {
            target,
            interval,
            max_attempts,
        }
    }

    /// A single attempt with no waiting, for point-in-time status.
    pub fn once(target: ProbeTarget) -> Self {
        Self::new(target, Duration::ZERO, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    Timeout { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// One readiness attempt against a target.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &ProbeTarget) -> bool;
}

/// Poll `check.target` until it is ready or `max_attempts` is used up.
///
/// Makes exactly `max_attempts` attempts and sleeps `interval` between them
/// but not after the last one. Never fails: a target that stays down yields
/// `Readiness::Timeout`.
pub async fn probe(prober: &dyn Probe, check: &ReadinessCheck) -> Readiness {
    let max_attempts = check.max_attempts;
    for attempt in 1..=max_attempts {
        let ready = prober.check(&check.target).await;
        tracing::debug!(probe = %check.target, attempt, max_attempts, ready, "readiness_attempt");
        if ready {
            return Readiness::Ready { attempts: attempt };
        }
        if attempt < max_attempts {
            tokio::time::sleep(check.interval).await;
        }
    }
    Readiness::Timeout {
        attempts: max_attempts,
    }
}

/// Live probe: HTTP via reqwest, commands via `tokio::process`.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, target: &ProbeTarget) -> bool {
        match target {
            ProbeTarget::Http { url, accept } => match self.client.get(url).send().await {
                Ok(response) => accept.contains(&response.status().as_u16()),
                Err(e) => {
                    tracing::trace!(url = %url, error = %e, "http_probe_failed");
                    false
                }
            },
            ProbeTarget::Command { program, args } => Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false),
        }
    }
}
