//! The trusted-login request gate.
//!
//! [`TrustedLoginGate::handle`] sits in front of a downstream handler. For an
//! ordinary request without a token it does nothing but wrap the request. When
//! a token is present it is verified and, on success, the request runs under
//! an impersonated session for the named user. No failure in this layer ever
//! reaches the client: a bad token, an unknown user or a broken collaborator
//! all degrade to running the request as whoever it already was.

use std::{fmt, future::Future, sync::Arc};

use trusted_login_session::{SessionContext, SessionManager, UserDirectory};

use crate::{
    binder::{Binding, Impersonation, SessionBinder, SkipReason},
    carrier::{GatedRequest, TokenCarrier},
    config::TrustedLoginConfig,
    error::{Severity, TokenError},
    metrics::{BindOutcome, GateMetrics},
    replay::{InMemoryReplayDetector, ReplayDetector},
    token::{SEPARATOR, TokenCodec},
};

/// Characters of the hash segment included in log lines.
const FINGERPRINT_LEN: usize = 8;

/// Verifies trusted-login tokens and binds requests to the users they name.
pub struct TrustedLoginGate {
    header_name: String,
    param_name: String,
    // A misconfigured gate still serves requests; every token fails with
    // this error instead.
    codec: Result<TokenCodec, TokenError>,
    binder: SessionBinder,
    replay: Option<Arc<dyn ReplayDetector>>,
    metrics: GateMetrics,
}

impl TrustedLoginGate {
    /// Builds a gate from `config`.
    ///
    /// Construction never fails. A missing secret or an unsupported algorithm
    /// is logged once here and then makes every token fail verification; use
    /// [`TrustedLoginConfig::validate`] to refuse such configurations up front.
    /// A replay detector is installed when `replay_window` is set.
    #[must_use]
    pub fn new(
        config: &TrustedLoginConfig,
        manager: Arc<dyn SessionManager>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let codec = config.digest_algorithm().and_then(|algorithm| match &config.shared_secret {
            Some(secret) => TokenCodec::new(secret.as_str(), algorithm),
            None => Err(TokenError::missing_secret()),
        });
        if let Err(err) = &codec {
            tracing::error!(error = %err, "Trusted-login gate cannot verify tokens");
        }

        let replay = config.replay_window.map(|window| {
            Arc::new(InMemoryReplayDetector::new(config.replay_capacity, window))
                as Arc<dyn ReplayDetector>
        });

        Self {
            header_name: config.header_name.clone(),
            param_name: config.param_name.clone(),
            codec,
            binder: SessionBinder::new(manager, directory),
            replay,
            metrics: GateMetrics::new(),
        }
    }

    /// Replaces the replay detector.
    #[must_use]
    pub fn with_replay_detector(mut self, detector: Arc<dyn ReplayDetector>) -> Self {
        self.replay = Some(detector);
        self
    }

    /// Shares an existing metrics collector instead of the gate's own.
    #[must_use]
    pub fn with_metrics(mut self, metrics: GateMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// The gate's counters.
    #[must_use]
    pub fn metrics(&self) -> &GateMetrics {
        &self.metrics
    }

    /// Returns `true` if tokens can be verified at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.codec.is_ok()
    }

    /// Reads the raw token from `request`.
    ///
    /// The header is consulted first, then the query parameter. Empty values
    /// count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidEncoding`] if the header value is not
    /// UTF-8.
    pub fn extract_token<R: TokenCarrier>(&self, request: &R) -> Result<Option<String>, TokenError> {
        if let Some(bytes) = request.header(&self.header_name)
            && !bytes.is_empty()
        {
            let value = std::str::from_utf8(bytes)
                .map_err(|err| TokenError::invalid_encoding(err.to_string()))?;
            return Ok(Some(value.to_owned()));
        }
        Ok(request.query_param(&self.param_name).filter(|value| !value.is_empty()))
    }

    /// Verifies `raw` and returns the user it names.
    ///
    /// With a replay detector installed, a successful verification also
    /// consumes the token.
    ///
    /// # Errors
    ///
    /// Returns the configuration error if the gate is misconfigured, any
    /// [`TokenCodec::decode`] error, or [`TokenError::Replayed`].
    pub async fn verify(&self, raw: &str) -> Result<String, TokenError> {
        let codec = self.codec.as_ref().map_err(Clone::clone)?;
        let token = codec.decode(raw)?;
        if let Some(replay) = &self.replay {
            replay.check_and_mark(token.hash()).await?;
        }
        Ok(token.user().to_owned())
    }

    /// Runs `downstream` for `request`, impersonating the token's user if the
    /// request carries a valid token.
    ///
    /// `ctx` is the request's session context. Whatever `downstream` returns
    /// is returned unchanged, and `ctx` holds its original session again once
    /// this future completes or is dropped.
    #[tracing::instrument(skip_all, fields(user = tracing::field::Empty))]
    pub async fn handle<R, F, Fut, T>(&self, request: R, ctx: &SessionContext, downstream: F) -> T
    where
        R: TokenCarrier,
        F: FnOnce(GatedRequest<R>) -> Fut,
        Fut: Future<Output = T>,
    {
        self.metrics.record_request();

        let raw = match self.extract_token(&request) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.metrics.record_absent();
                return downstream(GatedRequest::new(request, Binding::Unverified)).await;
            },
            Err(err) => {
                self.reject(&err, None);
                return downstream(GatedRequest::new(request, Binding::Unverified)).await;
            },
        };

        let user = match self.verify(&raw).await {
            Ok(user) => user,
            Err(err) => {
                self.reject(&err, Some(&raw));
                return downstream(GatedRequest::new(request, Binding::Unverified)).await;
            },
        };
        self.metrics.record_verified();
        tracing::Span::current().record("user", user.as_str());

        let impersonation = self.binder.impersonate(ctx, &user).await;
        self.metrics.record_bind(bind_outcome(&impersonation));

        let output = downstream(GatedRequest::new(request, impersonation.binding())).await;
        drop(impersonation);
        output
    }

    fn reject(&self, err: &TokenError, raw: Option<&str>) {
        self.metrics.record_rejected(err);
        let fingerprint = raw.map(fingerprint).unwrap_or_default();
        match err.severity() {
            Severity::Error => tracing::error!(
                error = %err,
                kind = err.kind(),
                "Trusted-login token ignored: gate is misconfigured"
            ),
            Severity::Warning => tracing::warn!(
                error = %err,
                kind = err.kind(),
                fingerprint,
                "Rejected trusted-login token"
            ),
        }
    }
}

fn bind_outcome(impersonation: &Impersonation<'_>) -> BindOutcome {
    match impersonation {
        Impersonation::SelfAsserted => BindOutcome::SelfAsserted,
        Impersonation::Active(_) => BindOutcome::Impersonated,
        Impersonation::Skipped(SkipReason::UnknownUser) => BindOutcome::UnknownUser,
        Impersonation::Skipped(SkipReason::Unavailable) => BindOutcome::Unavailable,
    }
}

/// Leading characters of the hash segment, safe to log.
fn fingerprint(raw: &str) -> &str {
    raw.split(SEPARATOR)
        .next()
        .and_then(|hash| hash.get(..FINGERPRINT_LEN))
        .unwrap_or_default()
}

impl fmt::Debug for TrustedLoginGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedLoginGate")
            .field("header_name", &self.header_name)
            .field("param_name", &self.param_name)
            .field("codec", &self.codec)
            .field("replay", &self.replay.is_some())
            .field("metrics", &self.metrics)
            .finish()
    }
}
