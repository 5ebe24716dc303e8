//! Controller behavior against a scripted wallet service.
//! Run: cargo test -p btc2-wallet --test controller

use async_trait::async_trait;
use btc2_rpc::LoginResult;
use btc2_types::{Amount, SignedAmount, TransactionRecord, TxCategory, WalletCreation};
use btc2_wallet::{
    CaptureSource, QrScanner, RefreshOutcome, RemoteWalletService, ScanError, Screen,
    ServiceError, StreamStatus, WalletConfig, WalletController,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const ONE: Amount = Amount::from_atomic(100_000_000);
const FEE: Amount = Amount::from_atomic(10_000);

// =============================================================================
// Scripted service
// =============================================================================

#[derive(Default)]
struct Calls {
    fee: AtomicUsize,
    balance: AtomicUsize,
    history: AtomicUsize,
    create: AtomicUsize,
    login: AtomicUsize,
    logout: AtomicUsize,
    send: AtomicUsize,
}

struct MockService {
    calls: Calls,
    login: Mutex<Result<LoginResult, ServiceError>>,
    balance: Mutex<Result<Amount, ServiceError>>,
    history: Mutex<Result<Vec<TransactionRecord>, ServiceError>>,
    fee: Mutex<Result<Amount, ServiceError>>,
    send: Mutex<Result<String, ServiceError>>,
    /// When set, `get_balance` takes a permit before answering.
    balance_gate: Option<Arc<Semaphore>>,
    /// When set, `send_transaction` takes a permit before answering.
    send_gate: Option<Arc<Semaphore>>,
}

impl MockService {
    fn new() -> Self {
        Self {
            calls: Calls::default(),
            login: Mutex::new(Ok(LoginResult {
                address: "bc2me".into(),
                balance: ONE,
            })),
            balance: Mutex::new(Ok(ONE)),
            history: Mutex::new(Ok(vec![TransactionRecord {
                txid: "aa".repeat(32),
                category: TxCategory::Receive,
                amount: SignedAmount::from_atomic(100_000_000),
                confirmations: 3,
            }])),
            fee: Mutex::new(Ok(FEE)),
            send: Mutex::new(Ok("bb".repeat(32))),
            balance_gate: None,
            send_gate: None,
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            balance_gate: Some(gate),
            ..Self::new()
        }
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteWalletService for MockService {
    async fn estimate_fee(&self, _target_blocks: u32) -> Result<Amount, ServiceError> {
        self.calls.fee.fetch_add(1, Ordering::SeqCst);
        self.fee.lock().unwrap().clone()
    }

    async fn get_balance(&self) -> Result<Amount, ServiceError> {
        self.calls.balance.fetch_add(1, Ordering::SeqCst);
        match &self.balance_gate {
            Some(gate) => gate.acquire().await.unwrap().forget(),
            // Stay pending for a poll so overlapping callers can observe it.
            None => tokio::task::yield_now().await,
        }
        self.balance.lock().unwrap().clone()
    }

    async fn get_history(&self) -> Result<Vec<TransactionRecord>, ServiceError> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.history.lock().unwrap().clone()
    }

    async fn create_wallet(&self) -> Result<WalletCreation, ServiceError> {
        let n = self.calls.create.fetch_add(1, Ordering::SeqCst);
        Ok(WalletCreation {
            encrypted_key: format!("enc-{n}"),
            private_key: format!("wif-{n}"),
            address: format!("bc2new{n}"),
        })
    }

    async fn login(&self, _encrypted_key: &str) -> Result<LoginResult, ServiceError> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        self.login.lock().unwrap().clone()
    }

    async fn logout(&self) -> Result<(), ServiceError> {
        self.calls.logout.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_transaction(&self, _address: &str, _amount: Amount) -> Result<String, ServiceError> {
        self.calls.send.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.send_gate {
            gate.acquire().await.unwrap().forget();
        }
        self.send.lock().unwrap().clone()
    }
}

fn controller(service: MockService) -> WalletController<MockService> {
    WalletController::new(service, WalletConfig::default())
}

async fn logged_in() -> WalletController<MockService> {
    let c = controller(MockService::new());
    c.login("enc-key").await.unwrap();
    c
}

// =============================================================================
// Scripted camera
// =============================================================================

#[derive(Default)]
struct Camera {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct ScriptedCapture {
    frames: VecDeque<Result<String, ScanError>>,
    /// Block forever once the frames run out instead of ending the stream.
    hang: bool,
    camera: Arc<Camera>,
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    fn open(&mut self) -> Result<(), ScanError> {
        self.camera.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<String, ScanError>> {
        tokio::task::yield_now().await;
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None if self.hang => std::future::pending().await,
            None => None,
        }
    }

    fn close(&mut self) {
        self.camera.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn camera(frames: Vec<Result<String, ScanError>>, hang: bool) -> (QrScanner, Arc<Camera>) {
    let cam = Arc::new(Camera::default());
    let source = ScriptedCapture {
        frames: frames.into(),
        hang,
        camera: cam.clone(),
    };
    (QrScanner::new(Box::new(source)), cam)
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn login_fetches_balance_history_and_fee() {
    let c = logged_in().await;
    let calls = &c.service().calls;

    assert_eq!(MockService::count(&calls.login), 1);
    assert_eq!(MockService::count(&calls.balance), 1);
    assert_eq!(MockService::count(&calls.history), 1);
    assert_eq!(MockService::count(&calls.fee), 1);

    let view = c.view();
    assert_eq!(view.screen, Screen::Wallet);
    assert_eq!(view.address.as_deref(), Some("bc2me"));
    assert_eq!(view.balance, ONE);
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.fee, FEE);
    assert!(view.last_refresh.is_some());
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn rejected_login_shows_backend_message_and_fetches_nothing() {
    let svc = MockService::new();
    *svc.login.lock().unwrap() = Err(ServiceError::Rejected(Some("invalid key".into())));
    let c = controller(svc);

    assert!(c.login("bad").await.is_err());

    assert_eq!(c.error().as_deref(), Some("invalid key"));
    assert!(!c.is_logged_in());
    let calls = &c.service().calls;
    assert_eq!(MockService::count(&calls.balance), 0);
    assert_eq!(MockService::count(&calls.history), 0);
    assert_eq!(MockService::count(&calls.fee), 0);
}

#[tokio::test]
async fn login_transport_failure_uses_generic_message() {
    let svc = MockService::new();
    *svc.login.lock().unwrap() = Err(ServiceError::Transport("connection refused".into()));
    let c = controller(svc);

    assert!(c.login("k").await.is_err());
    assert_eq!(c.error().as_deref(), Some("Login request failed"));
}

#[tokio::test]
async fn logout_is_idempotent_and_clears_everything() {
    let c = logged_in().await;
    c.set_recipient("bc2x");
    c.set_amount("0.5");

    c.logout().await;
    c.logout().await;

    let view = c.view();
    assert_eq!(view.screen, Screen::Login);
    assert_eq!(view.address, None);
    assert_eq!(view.balance, Amount::ZERO);
    assert!(view.history.is_empty());
    assert!(view.send_form.recipient.is_empty());
    assert!(view.send_form.amount.is_empty());
    assert_eq!(view.error, None);
    // Only the first logout had a session to end.
    assert_eq!(MockService::count(&c.service().calls.logout), 1);
}

#[tokio::test]
async fn wallet_creation_replaces_previous_result() {
    let c = controller(MockService::new());
    c.open_wallet_creation().unwrap();

    let first = c.create_wallet().await.unwrap();
    let second = c.create_wallet().await.unwrap();

    assert_ne!(first, second);
    assert_eq!(c.view().screen, Screen::NewWallet(Some(second)));
    assert!(!c.is_logged_in());

    c.back_to_login().unwrap();
    assert_eq!(c.view().screen, Screen::Login);
}

#[tokio::test]
async fn wallet_creation_refused_while_logged_in() {
    let c = logged_in().await;
    assert!(c.open_wallet_creation().is_err());
    assert_eq!(MockService::count(&c.service().calls.create), 0);
}

// =============================================================================
// Sync
// =============================================================================

#[tokio::test]
async fn overlapping_refreshes_issue_one_request_pair() {
    let c = logged_in().await;
    let calls = &c.service().calls;

    let (a, b) = tokio::join!(c.refresh(), c.refresh());
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, RefreshOutcome::Skipped)).count(),
        1
    );
    assert_eq!(MockService::count(&calls.balance), 2);
    assert_eq!(MockService::count(&calls.history), 2);
}

#[tokio::test]
async fn refresh_completing_after_logout_is_dropped() {
    let gate = Arc::new(Semaphore::new(1));
    let c = controller(MockService::gated(gate.clone()));
    c.login("k").await.unwrap();

    let (outcome, _) = tokio::join!(c.refresh(), async {
        tokio::task::yield_now().await;
        c.logout().await;
        gate.add_permits(1);
    });

    assert_eq!(outcome.unwrap(), RefreshOutcome::Discarded);
    assert_eq!(c.balance(), Amount::ZERO);
    assert!(c.history().is_empty());
    assert_eq!(c.error(), None);
}

#[tokio::test]
async fn relogin_waits_for_stale_refresh_then_refreshes() {
    let gate = Arc::new(Semaphore::new(1));
    let c = controller(MockService::gated(gate.clone()));
    c.login("k").await.unwrap();

    let (stale, relogin) = tokio::join!(c.refresh(), async {
        tokio::task::yield_now().await;
        c.logout().await;
        gate.add_permits(2);
        c.login("k").await
    });

    assert_eq!(stale.unwrap(), RefreshOutcome::Discarded);
    assert!(relogin.is_ok());
    let view = c.view();
    assert_eq!(view.history_status, StreamStatus::Ready);
    assert_eq!(view.history.len(), 1);
    assert!(view.last_refresh.is_some());
    // First login, stale refresh, second login.
    assert_eq!(MockService::count(&c.service().calls.balance), 3);
}

#[tokio::test]
async fn history_failure_does_not_block_balance() {
    let c = logged_in().await;
    *c.service().balance.lock().unwrap() = Ok(Amount::from_atomic(200_000_000));
    *c.service().history.lock().unwrap() = Err(ServiceError::Transport("reset".into()));

    let outcome = c.refresh().await.unwrap();

    assert!(matches!(outcome, RefreshOutcome::Completed(ref r) if r.balance.is_ok()));
    let view = c.view();
    assert_eq!(view.balance, Amount::from_atomic(200_000_000));
    assert_eq!(view.balance_status, StreamStatus::Ready);
    assert!(matches!(view.history_status, StreamStatus::Failed(_)));
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.error.as_deref(), Some("Error fetching wallet data"));
}

#[tokio::test]
async fn refresh_failure_keeps_last_balance() {
    let c = logged_in().await;
    *c.service().balance.lock().unwrap() = Err(ServiceError::Transport("timeout".into()));

    let outcome = c.refresh().await.unwrap();

    assert!(matches!(outcome, RefreshOutcome::Completed(ref r) if !r.is_ok()));
    assert_eq!(c.balance(), ONE);
    assert_eq!(c.error().as_deref(), Some("Error fetching wallet data"));
}

#[tokio::test]
async fn refresh_requires_session() {
    let c = controller(MockService::new());
    assert!(c.refresh().await.is_err());
    assert_eq!(MockService::count(&c.service().calls.balance), 0);
}

#[tokio::test(start_paused = true)]
async fn auto_refresh_runs_on_interval() {
    let c = logged_in().await;
    let calls = &c.service().calls;

    tokio::select! {
        _ = c.run_auto_refresh() => unreachable!(),
        _ = tokio::time::sleep(Duration::from_secs(65)) => {}
    }

    // One from login, then ticks at 30s and 60s.
    assert_eq!(MockService::count(&calls.balance), 3);
    assert_eq!(MockService::count(&calls.fee), 3);
}

#[tokio::test(start_paused = true)]
async fn fee_failure_keeps_previous_estimate() {
    let svc = MockService::new();
    *svc.fee.lock().unwrap() = Ok(Amount::from_atomic(20_000));
    let c = controller(svc);
    c.login("k").await.unwrap();
    assert_eq!(c.fee(), Amount::from_atomic(20_000));

    *c.service().fee.lock().unwrap() = Err(ServiceError::Transport("timeout".into()));
    tokio::select! {
        _ = c.run_auto_refresh() => unreachable!(),
        _ = tokio::time::sleep(Duration::from_secs(35)) => {}
    }

    assert_eq!(MockService::count(&c.service().calls.fee), 2);
    assert_eq!(c.fee(), Amount::from_atomic(20_000));
}

#[tokio::test(start_paused = true)]
async fn zero_fee_estimate_is_ignored() {
    let svc = MockService::new();
    *svc.fee.lock().unwrap() = Ok(Amount::from_atomic(20_000));
    let c = controller(svc);
    c.login("k").await.unwrap();

    *c.service().fee.lock().unwrap() = Ok(Amount::ZERO);
    tokio::select! {
        _ = c.run_auto_refresh() => unreachable!(),
        _ = tokio::time::sleep(Duration::from_secs(35)) => {}
    }

    assert_eq!(MockService::count(&c.service().calls.fee), 2);
    assert_eq!(c.fee(), Amount::from_atomic(20_000));
}

// =============================================================================
// Send
// =============================================================================

#[tokio::test]
async fn send_within_balance_submits_once_and_clears_form() {
    let c = logged_in().await;
    c.set_recipient("bc2friend");
    c.set_amount("0.9999");

    let receipt = c.send().await.unwrap();

    assert_eq!(receipt.amount.atomic(), 99_990_000);
    assert_eq!(receipt.recipient, "bc2friend");
    let calls = &c.service().calls;
    assert_eq!(MockService::count(&calls.send), 1);
    // Post-send refresh.
    assert_eq!(MockService::count(&calls.balance), 2);
    assert!(c.send_form().recipient.is_empty());
    assert_eq!(c.error(), None);
}

#[tokio::test]
async fn send_over_balance_never_reaches_service() {
    let c = logged_in().await;
    c.set_recipient("bc2friend");
    c.set_amount("1.0");

    assert!(c.send().await.is_err());

    let msg = c.error().unwrap();
    assert!(msg.contains("1.00010000"), "{msg}");
    assert_eq!(MockService::count(&c.service().calls.send), 0);
    assert_eq!(c.send_form().amount, "1.0");
}

#[tokio::test]
async fn missing_fields_reported_before_bad_amount() {
    let c = logged_in().await;
    c.set_amount("abc");

    assert!(c.send().await.is_err());

    assert!(c.error().unwrap().starts_with("missing fields"));
    assert_eq!(MockService::count(&c.service().calls.send), 0);
}

#[tokio::test]
async fn rejected_send_keeps_form() {
    let c = logged_in().await;
    *c.service().send.lock().unwrap() = Err(ServiceError::Rejected(Some("mempool full".into())));
    c.set_recipient("bc2friend");
    c.set_amount("0.1");

    assert!(c.send().await.is_err());

    assert_eq!(c.error().as_deref(), Some("mempool full"));
    assert_eq!(c.send_form().recipient, "bc2friend");
    assert_eq!(c.send_form().amount, "0.1");
}

#[tokio::test]
async fn rejected_send_without_reason_names_fee() {
    let c = logged_in().await;
    *c.service().send.lock().unwrap() = Err(ServiceError::Rejected(None));
    c.set_recipient("bc2friend");
    c.set_amount("0.1");

    assert!(c.send().await.is_err());
    assert!(c.error().unwrap().contains("(0.00010000 BTC2)"));
}

#[tokio::test]
async fn send_finishing_after_logout_skips_refresh() {
    let gate = Arc::new(Semaphore::new(0));
    let c = controller(MockService {
        send_gate: Some(gate.clone()),
        ..MockService::new()
    });
    c.login("k").await.unwrap();
    c.set_recipient("bc2friend");
    c.set_amount("0.1");

    let (sent, _) = tokio::join!(c.send(), async {
        tokio::task::yield_now().await;
        c.logout().await;
        gate.add_permits(1);
    });

    assert!(sent.is_ok());
    assert_eq!(MockService::count(&c.service().calls.balance), 1);
    assert_eq!(c.balance(), Amount::ZERO);
    assert_eq!(c.error(), None);
}

#[tokio::test]
async fn send_failing_after_logout_leaves_error_slot_empty() {
    let gate = Arc::new(Semaphore::new(0));
    let c = controller(MockService {
        send_gate: Some(gate.clone()),
        ..MockService::new()
    });
    *c.service().send.lock().unwrap() = Err(ServiceError::Rejected(Some("mempool full".into())));
    c.login("k").await.unwrap();
    c.set_recipient("bc2friend");
    c.set_amount("0.1");

    let (sent, _) = tokio::join!(c.send(), async {
        tokio::task::yield_now().await;
        c.logout().await;
        gate.add_permits(1);
    });

    assert!(sent.is_err());
    assert_eq!(c.error(), None);
    assert_eq!(c.view().screen, Screen::Login);
}

// =============================================================================
// QR
// =============================================================================

#[tokio::test]
async fn scan_fills_recipient_and_releases_camera() {
    let (scanner, cam) = camera(
        vec![Err(ScanError::NoCode("blur".into())), Ok("bc2addr123".into())],
        true,
    );
    let c = controller(MockService::new()).with_scanner(scanner);
    c.login("k").await.unwrap();

    let decoded = c.scan_address().await.unwrap();

    assert_eq!(decoded.as_deref(), Some("bc2addr123"));
    assert_eq!(c.send_form().recipient, "bc2addr123");
    assert_eq!(cam.opened.load(Ordering::SeqCst), 1);
    assert_eq!(cam.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_scan_leaves_recipient_and_releases_camera() {
    let (scanner, cam) = camera(Vec::new(), true);
    let c = controller(MockService::new()).with_scanner(scanner);
    c.login("k").await.unwrap();
    c.set_recipient("keep");

    let (decoded, _) = tokio::join!(c.scan_address(), async {
        tokio::task::yield_now().await;
        c.cancel_scan();
    });

    assert_eq!(decoded.unwrap(), None);
    assert_eq!(c.send_form().recipient, "keep");
    assert_eq!(cam.closed.load(Ordering::SeqCst), 1);
    assert!(!c.view().scanning);
}

#[tokio::test]
async fn cancel_without_scan_is_noop() {
    let c = logged_in().await;
    c.cancel_scan();
    assert_eq!(c.error(), None);
}

#[tokio::test]
async fn address_qr_requires_session() {
    let c = controller(MockService::new());
    assert!(c.address_qr_svg().is_err());

    c.login("k").await.unwrap();
    let svg = c.address_qr_svg().unwrap();
    assert!(svg.contains("<svg"));
    assert_eq!(svg, c.address_qr_svg().unwrap());
}
