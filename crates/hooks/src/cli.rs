//! Hook entry points shared by the binaries.
//!
//! Every command returns a process exit code and ends with one summary log
//! line. [`main_with`] wraps a command in a current-thread runtime and races
//! it against SIGTERM/SIGINT so no backoff or polling sleep outlives a
//! termination request.

use anyhow::Context;
use dnsexit_common::{Clock, LogConfig, LogLevel, Redactor, SystemClock};
use dnsexit_config::keys::REGISTRY;
use dnsexit_config::{ConfigResolver, Environment};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::challenge::{run_batch, ChallengeRequest};
use crate::dns::{DnsExitProvider, DnsProvider, HickoryTxtResolver, PropagationChecker, TxtResolver};
use crate::hook::{exit, AuthHook, CleanupHook, HookError, HookState};
use crate::settings::{self, ApiSettings, PropagationSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the challenge record and wait for it (certbot `--manual-auth-hook`)
    Auth,
    /// Delete the challenge record (certbot `--manual-cleanup-hook`)
    Cleanup,
    /// Create, confirm and delete throwaway records for `domains`
    Verify { domains: Vec<String> },
    /// Resolve and print every setting
    CheckConfig,
}

/// Everything a hook run depends on from the outside world.
#[derive(Debug, Clone)]
pub struct HookRuntime {
    env: Environment,
    txt_resolver: Option<Arc<dyn TxtResolver>>,
    clock: Arc<dyn Clock>,
}

impl HookRuntime {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            txt_resolver: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `resolver` for propagation checks instead of querying the nameserver.
    pub fn with_txt_resolver(mut self, resolver: Arc<dyn TxtResolver>) -> Self {
        self.txt_resolver = Some(resolver);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn execute(&self, command: &Command) -> i32 {
        match command {
            Command::Auth => self.run_auth().await,
            Command::Cleanup => self.run_cleanup().await,
            Command::Verify { domains } => self.run_verify(domains).await,
            Command::CheckConfig => self.check_config().await,
        }
    }

    /// Install the global subscriber from the log settings.
    ///
    /// `verbose` forces debug level regardless of `log_level`.
    pub fn init_logging(&self, verbose: bool) {
        let (mut config, problem): (LogConfig, _) = match self
            .config_resolver()
            .and_then(|resolver| settings::log_config(&resolver).map_err(HookError::from))
        {
            Ok(config) => (config, None),
            Err(e) => (Default::default(), Some(e)),
        };

        if verbose {
            config.level = LogLevel::Debug;
        }
        if let Err(e) = config.init() {
            eprintln!("{}", e);
        }
        if let Some(e) = problem {
            warn!(error = %e, "Invalid log settings, using defaults");
        }
    }

    pub async fn run_auth(&self) -> i32 {
        let mut redactor = Redactor::new();
        let (domain, result) = match ChallengeRequest::from_env(&self.env, true) {
            Ok(request) => {
                let result = self.auth(&request, &mut redactor).await;
                (request.domain().to_string(), result)
            }
            Err(e) => ("<unknown>".to_string(), Err(e)),
        };
        summarize("auth", &domain, result, &redactor)
    }

    pub async fn run_cleanup(&self) -> i32 {
        let mut redactor = Redactor::new();
        let (domain, result) = match ChallengeRequest::from_env(&self.env, false) {
            Ok(request) => {
                let result = self.cleanup(&request, &mut redactor).await;
                (request.domain().to_string(), result)
            }
            Err(e) => ("<unknown>".to_string(), Err(e)),
        };
        summarize("cleanup", &domain, result, &redactor)
    }

    /// Self-test: create and confirm a random token per domain, then clean up.
    pub async fn run_verify(&self, domains: &[String]) -> i32 {
        let mut redactor = Redactor::new();
        let label = domains.join(",");

        let (hook, provider) = match self.build_auth(&mut redactor).await {
            Ok(parts) => parts,
            Err(e) => return summarize("verify", &label, Err(e), &redactor),
        };

        let requests: Vec<ChallengeRequest> = domains
            .iter()
            .map(|d| ChallengeRequest::new(d.as_str(), Uuid::new_v4().simple().to_string()))
            .collect();

        let report = run_batch(&hook, provider.as_ref(), &requests).await;

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(()) => info!(domain = %outcome.domain, "Challenge record propagated"),
                Err(e) => warn!(domain = %outcome.domain, error = %redactor.redact(&e.to_string()), "Challenge failed"),
            }
        }
        for domain in &report.skipped {
            warn!(domain = %domain, "Skipped after an earlier failure");
        }
        for cleanup in &report.cleanup {
            if let Err(e) = &cleanup.result {
                warn!(domain = %cleanup.domain, record = %cleanup.record, error = %redactor.redact(&e.to_string()), "Cleanup failed");
            }
        }

        let result = if report.succeeded() {
            Ok(())
        } else if let Some(e) = report.first_error() {
            Err(clone_for_exit(e))
        } else {
            Err(HookError::Unexpected(
                "one or more challenge records could not be deleted".to_string(),
            ))
        };
        summarize("verify", &label, result, &redactor)
    }

    /// Resolve every known setting and print it with sensitive values masked.
    pub async fn check_config(&self) -> i32 {
        let resolver = match self.config_resolver() {
            Ok(resolver) => resolver,
            Err(e) => return summarize("check-config", "configuration", Err(e), &Redactor::new()),
        };

        let mut code = exit::SUCCESS;
        for spec in REGISTRY {
            match resolver.resolve(&spec.key()).await {
                Ok(Some(value)) => println!("{}", value),
                Ok(None) if spec.required => {
                    error!(key = spec.name, "Required setting is missing");
                    println!("{}=<missing> (required)", spec.name);
                    code = exit::CONFIG;
                }
                Ok(None) => println!("{}=<unset>", spec.name),
                Err(e) => {
                    error!(key = spec.name, error = %e, "Setting cannot be resolved");
                    code = exit::CONFIG;
                }
            }
        }

        if code == exit::SUCCESS {
            let typed = match ApiSettings::load(&resolver).await {
                Ok(_) => PropagationSettings::load(&resolver).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = typed {
                error!(error = %e, "Setting has an invalid value");
                code = exit::CONFIG;
            }
        }

        if code == exit::SUCCESS {
            info!("Configuration is complete");
        } else {
            error!(exit_code = code, "Configuration is incomplete or invalid");
        }
        code
    }

    fn config_resolver(&self) -> Result<ConfigResolver, HookError> {
        Ok(ConfigResolver::new(self.env.clone())?)
    }

    async fn auth(&self, request: &ChallengeRequest, redactor: &mut Redactor) -> Result<(), HookError> {
        info!(hook = "auth", state = ?HookState::Start, domain = %request.domain(), "Hook started");
        let (hook, _) = self.build_auth(redactor).await?;
        hook.run(request).await?;
        Ok(())
    }

    async fn cleanup(&self, request: &ChallengeRequest, redactor: &mut Redactor) -> Result<(), HookError> {
        info!(hook = "cleanup", state = ?HookState::Start, domain = %request.domain(), "Hook started");
        let resolver = self.config_resolver()?;
        let api = load_api(&resolver, redactor).await?;
        let provider: Arc<dyn DnsProvider> =
            Arc::new(DnsExitProvider::new(api.provider, Arc::clone(&self.clock))?);

        CleanupHook::new(provider).with_zone(api.zone).run(request).await
    }

    async fn build_auth(
        &self,
        redactor: &mut Redactor,
    ) -> Result<(AuthHook, Arc<dyn DnsProvider>), HookError> {
        let resolver = self.config_resolver()?;
        let api = load_api(&resolver, redactor).await?;
        let propagation = PropagationSettings::load(&resolver)
            .await
            .inspect_err(|e| error!(error = %e, "Fatal configuration error"))?;

        let provider: Arc<dyn DnsProvider> =
            Arc::new(DnsExitProvider::new(api.provider, Arc::clone(&self.clock))?);

        let txt_resolver: Arc<dyn TxtResolver> = match &self.txt_resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(
                HickoryTxtResolver::new(&propagation.checker.nameserver, propagation.query_timeout)
                    .await?,
            ),
        };

        let checker = PropagationChecker::new(propagation.checker, txt_resolver, Arc::clone(&self.clock));
        let hook = AuthHook::new(Arc::clone(&provider), checker).with_zone(api.zone);
        Ok((hook, provider))
    }
}

/// Load API settings, registering the key with `redactor` as soon as it is known.
async fn load_api(resolver: &ConfigResolver, redactor: &mut Redactor) -> Result<ApiSettings, HookError> {
    let api = ApiSettings::load(resolver).await.inspect_err(|e| {
        error!(error = %e, "Fatal configuration error, aborting before any DNS API call")
    })?;
    redactor.add(api.provider.api_key.clone());
    Ok(api)
}

/// Rebuild an error for its exit code, keeping the original message.
fn clone_for_exit(e: &HookError) -> HookError {
    match e {
        HookError::PropagationTimeout { record, waited } => HookError::PropagationTimeout {
            record: record.clone(),
            waited: *waited,
        },
        HookError::MissingChallenge(var) => HookError::MissingChallenge(var),
        HookError::Interrupted(signal) => HookError::Interrupted(signal),
        other => HookError::Unexpected(other.to_string()),
    }
}

/// Log the final line for a run and map it to an exit code.
fn summarize(hook: &str, domain: &str, result: Result<(), HookError>, redactor: &Redactor) -> i32 {
    match result {
        Ok(()) => {
            info!("{} hook succeeded for {}", hook, domain);
            exit::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            error!(
                exit_code = code,
                "{} hook failed for {}: {}",
                hook,
                domain,
                redactor.redact(&e.to_string())
            );
            code
        }
    }
}

fn build_runtime() -> anyhow::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

/// Resolves when the process is asked to stop.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = term.recv() => "SIGTERM",
                _ = ctrl_c() => "SIGINT",
            },
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "SIGINT"
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a handler the default disposition still terminates the process
        std::future::pending::<()>().await;
    }
}

/// Run `command` against the process environment and return the exit code.
pub fn main_with(command: Command, verbose: bool) -> i32 {
    let runtime_env = HookRuntime::new(Environment::from_process());
    runtime_env.init_logging(verbose);

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Hook could not start");
            return exit::FAILURE;
        }
    };

    runtime.block_on(async {
        tokio::select! {
            code = runtime_env.execute(&command) => code,
            signal = shutdown_signal() => {
                let e = HookError::Interrupted(signal);
                warn!(signal, "Termination requested, abandoning hook run");
                summarize(command_name(&command), "current run", Err(e), &Redactor::new())
            }
        }
    })
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Auth => "auth",
        Command::Cleanup => "cleanup",
        Command::Verify { .. } => "verify",
        Command::CheckConfig => "check-config",
    }
}
