//! Mock implementations of environment seams.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gatepass_core::environment::Clock;
use gatepass_core::gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, Verification,
    VerificationOutcome,
};
use gatepass_core::qr::{QrError, QrRenderer};
use gatepass_core::types::{PaymentReference, QrToken};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Clock
// ============================================================================

/// Deterministic clock. Clones share the same instant, so a test can advance
/// time underneath an engine that holds its own copy.
///
/// # Example
///
/// ```
/// use gatepass_testing::mocks::FixedClock;
/// use gatepass_core::environment::Clock;
/// use chrono::{Duration, Utc};
///
/// let clock = FixedClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::hours(1));
/// assert_eq!(clock.now() - before, Duration::hours(1));
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut time = lock(&self.time);
        *time += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.time) = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.time)
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

// ============================================================================
// Payment gateway
// ============================================================================

type VerifyResult = Result<Verification, GatewayError>;

/// Gateway double with scripted verdicts.
///
/// `verify` pops per-reference scripted results first, then falls back to
/// the default verdict. Every call is counted.
#[derive(Debug)]
pub struct ScriptedGateway {
    default_verify: Mutex<VerifyResult>,
    scripted: Mutex<HashMap<PaymentReference, VecDeque<VerifyResult>>>,
    initiate_result: Mutex<Result<(), GatewayError>>,
    initiated: Mutex<Vec<CheckoutRequest>>,
    verify_calls: AtomicUsize,
    delay: Option<std::time::Duration>,
}

impl ScriptedGateway {
    /// Gateway whose default verdict is `outcome`.
    #[must_use]
    pub fn new(outcome: VerificationOutcome) -> Self {
        Self {
            default_verify: Mutex::new(Ok(Verification::outcome(outcome))),
            scripted: Mutex::new(HashMap::new()),
            initiate_result: Mutex::new(Ok(())),
            initiated: Mutex::new(Vec::new()),
            verify_calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Every verification reports a capture.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(VerificationOutcome::Successful)
    }

    /// Every verification reports the payment still in flight.
    #[must_use]
    pub fn pending() -> Self {
        Self::new(VerificationOutcome::Pending)
    }

    /// Every verification reports a decline.
    #[must_use]
    pub fn declining() -> Self {
        Self::new(VerificationOutcome::Failed)
    }

    /// Every call fails at the transport level.
    #[must_use]
    pub fn unavailable() -> Self {
        let gateway = Self::new(VerificationOutcome::Unknown);
        gateway.set_default(Err(GatewayError::Unavailable("connection refused".to_string())));
        gateway.fail_initiate(GatewayError::Unavailable("connection refused".to_string()));
        gateway
    }

    /// Sleep this long inside every `verify`, to widen race windows.
    #[must_use]
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the default verdict.
    pub fn set_default(&self, result: VerifyResult) {
        *lock(&self.default_verify) = result;
    }

    /// Queue a one-shot verdict for `reference`.
    pub fn push(&self, reference: &PaymentReference, result: VerifyResult) {
        lock(&self.scripted)
            .entry(reference.clone())
            .or_default()
            .push_back(result);
    }

    /// Make `initiate` fail.
    pub fn fail_initiate(&self, err: GatewayError) {
        *lock(&self.initiate_result) = Err(err);
    }

    /// Number of `verify` calls so far.
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Checkout requests received so far.
    #[must_use]
    pub fn initiated(&self) -> Vec<CheckoutRequest> {
        lock(&self.initiated).clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        lock(&self.initiate_result).clone()?;
        lock(&self.initiated).push(request.clone());
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/pay/{}", request.reference),
        })
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<Verification, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.scripted)
            .get_mut(reference)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| lock(&self.default_verify).clone())
    }
}

// ============================================================================
// QR rendering
// ============================================================================

/// Renders a recognisable placeholder instead of an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubQrRenderer;

impl QrRenderer for StubQrRenderer {
    fn render(&self, token: &QrToken) -> Result<String, QrError> {
        Ok(format!("data:text/plain,{token}"))
    }
}

/// Always fails, to exercise transaction aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingQrRenderer;

impl QrRenderer for FailingQrRenderer {
    fn render(&self, _token: &QrToken) -> Result<String, QrError> {
        Err(QrError("renderer offline".to_string()))
    }
}
