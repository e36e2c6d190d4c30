// AccountStore conformance suite.
//
// Every store backend runs the same cases against a fresh store per case.
// Failures are collected instead of panicking mid-suite so the report shows
// every broken behaviour at once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};

use gateway_link_core::{AccountStore, LinkedAccount, TokenSet, GATEWAY_PROVIDER_ID};

type CaseResult = Result<(), String>;
type CaseFuture = Pin<Box<dyn Future<Output = CaseResult> + Send>>;
type CaseFn = fn(Arc<dyn AccountStore>) -> CaseFuture;

/// Outcome of one suite run.
#[derive(Debug, Clone, Default)]
pub struct StoreSuiteReport {
    pub store_name: String,
    pub passed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub duration_ms: f64,
}

impl StoreSuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Panic with every failure listed.
    pub fn assert_all_passed(&self) {
        if !self.is_success() {
            let lines: Vec<String> = self
                .failed
                .iter()
                .map(|(name, why)| format!("  {name}: {why}"))
                .collect();
            panic!(
                "[{}] {} of {} store cases failed:\n{}",
                self.store_name,
                self.failed.len(),
                self.failed.len() + self.passed.len(),
                lines.join("\n")
            );
        }
    }
}

/// Run every case against a fresh store from `make_store`.
pub async fn run_account_store_suite<F, Fut>(store_name: &str, make_store: F) -> StoreSuiteReport
where
    F: Fn() -> Fut,
    Fut: Future<Output = Arc<dyn AccountStore>>,
{
    let start = Instant::now();
    let mut report = StoreSuiteReport {
        store_name: store_name.to_string(),
        ..Default::default()
    };

    for (name, case) in cases() {
        let store = make_store().await;
        match case(store).await {
            Ok(()) => {
                tracing::debug!("[{store_name}] ✓ {name}");
                report.passed.push(name.to_string());
            }
            Err(why) => {
                tracing::error!("[{store_name}] ✗ {name}: {why}");
                report.failed.push((name.to_string(), why));
            }
        }
    }

    report.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    tracing::info!(
        "[{store_name}] {} passed, {} failed ({:.2}ms)",
        report.passed.len(),
        report.failed.len(),
        report.duration_ms
    );
    report
}

macro_rules! case {
    ($name:literal, $f:ident) => {
        (
            $name,
            (|s: Arc<dyn AccountStore>| -> CaseFuture { Box::pin($f(s)) }) as CaseFn,
        )
    };
}

fn cases() -> Vec<(&'static str, CaseFn)> {
    vec![
        case!("find missing returns none", find_missing_returns_none),
        case!("insert then find", insert_then_find),
        case!("insert duplicate key fails", insert_duplicate_fails),
        case!("rows are scoped by provider", rows_scoped_by_provider),
        case!("update tokens replaces token columns", update_tokens_replaces_tokens),
        case!("update tokens on missing row", update_tokens_missing_row),
        case!("upsert creates when absent", upsert_creates),
        case!("upsert keeps row identity", upsert_keeps_identity),
        case!("upsert with the stored id is an update", upsert_with_stored_id_updates),
        case!("empty token columns round-trip", empty_tokens_round_trip),
        case!("concurrent upserts converge", concurrent_upserts_converge),
    ]
}

// ─── Fixtures ────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).single().unwrap_or_else(Utc::now)
        + Duration::milliseconds(789)
}

fn tokens(access: &str, refresh: &str, issued_at: DateTime<Utc>) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        access_token_expires_at: issued_at + Duration::seconds(3600),
        refresh_token_expires_at: issued_at + Duration::seconds(86400),
    }
}

fn gateway_row(id: &str, user_id: &str, account_id: &str, access: &str) -> LinkedAccount {
    LinkedAccount::new_gateway(
        id.to_string(),
        user_id,
        account_id,
        &tokens(access, &format!("{access}-r"), t0()),
        t0(),
    )
}

fn upstream_row(user_id: &str, provider_id: &str) -> LinkedAccount {
    LinkedAccount {
        id: format!("{user_id}-{provider_id}"),
        account_id: format!("{provider_id}-acct"),
        provider_id: provider_id.to_string(),
        user_id: user_id.to_string(),
        access_token: Some("tok-up".into()),
        refresh_token: None,
        access_token_expires_at: None,
        refresh_token_expires_at: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

fn ensure(cond: bool, msg: impl Into<String>) -> CaseResult {
    if cond {
        Ok(())
    } else {
        Err(msg.into())
    }
}

fn ensure_eq<T: PartialEq + std::fmt::Debug>(left: T, right: T, what: &str) -> CaseResult {
    ensure(left == right, format!("{what}: expected {right:?}, got {left:?}"))
}

async fn find(store: &dyn AccountStore, user_id: &str, provider_id: &str) -> Result<LinkedAccount, String> {
    store
        .find_account(user_id, provider_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("row ({user_id}, {provider_id}) not found"))
}

// ─── Cases ───────────────────────────────────────────────────────

async fn find_missing_returns_none(store: Arc<dyn AccountStore>) -> CaseResult {
    let found = store
        .find_account("nobody", GATEWAY_PROVIDER_ID)
        .await
        .map_err(|e| e.to_string())?;
    ensure(found.is_none(), "expected no row")
}

async fn insert_then_find(store: Arc<dyn AccountStore>) -> CaseResult {
    let row = gateway_row("row-1", "u1", "g-123", "gw-a");
    store.insert_account(row.clone()).await.map_err(|e| e.to_string())?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found, row, "stored row")
}

async fn insert_duplicate_fails(store: Arc<dyn AccountStore>) -> CaseResult {
    store
        .insert_account(gateway_row("row-1", "u1", "g-1", "a"))
        .await
        .map_err(|e| e.to_string())?;
    let second = store.insert_account(gateway_row("row-2", "u1", "g-1", "b")).await;
    ensure(second.is_err(), "second insert for the same key succeeded")?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found.id.as_str(), "row-1", "surviving row id")
}

async fn rows_scoped_by_provider(store: Arc<dyn AccountStore>) -> CaseResult {
    store
        .insert_account(upstream_row("u1", "fortytwo"))
        .await
        .map_err(|e| e.to_string())?;
    store
        .insert_account(gateway_row("gw", "u1", "g-1", "gw-a"))
        .await
        .map_err(|e| e.to_string())?;

    let later = t0() + Duration::seconds(10);
    store
        .update_tokens("u1", GATEWAY_PROVIDER_ID, &tokens("gw-b", "gw-b-r", later), later)
        .await
        .map_err(|e| e.to_string())?;

    let upstream = find(store.as_ref(), "u1", "fortytwo").await?;
    ensure_eq(upstream.access_token.as_deref(), Some("tok-up"), "upstream token")?;
    let other_user = store
        .find_account("u2", "fortytwo")
        .await
        .map_err(|e| e.to_string())?;
    ensure(other_user.is_none(), "row leaked to another user")
}

async fn update_tokens_replaces_tokens(store: Arc<dyn AccountStore>) -> CaseResult {
    let original = gateway_row("row-1", "u1", "g-1", "gw-a");
    store.insert_account(original.clone()).await.map_err(|e| e.to_string())?;

    let later = t0() + Duration::seconds(120);
    let updated = store
        .update_tokens("u1", GATEWAY_PROVIDER_ID, &tokens("gw-b", "gw-b-r", later), later)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("update returned no row")?;

    ensure_eq(updated.id.as_str(), "row-1", "id")?;
    ensure_eq(updated.account_id.as_str(), "g-1", "accountId")?;
    ensure_eq(updated.created_at, original.created_at, "createdAt")?;
    ensure_eq(updated.updated_at, later, "updatedAt")?;
    ensure_eq(updated.access_token.as_deref(), Some("gw-b"), "accessToken")?;
    ensure_eq(
        updated.access_token_expires_at,
        Some(later + Duration::seconds(3600)),
        "accessTokenExpiresAt",
    )?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found, updated, "persisted row")
}

async fn update_tokens_missing_row(store: Arc<dyn AccountStore>) -> CaseResult {
    let out = store
        .update_tokens("ghost", GATEWAY_PROVIDER_ID, &tokens("a", "r", t0()), t0())
        .await
        .map_err(|e| e.to_string())?;
    ensure(out.is_none(), "update of a missing row returned a row")?;
    let found = store
        .find_account("ghost", GATEWAY_PROVIDER_ID)
        .await
        .map_err(|e| e.to_string())?;
    ensure(found.is_none(), "update created a row")
}

async fn upsert_creates(store: Arc<dyn AccountStore>) -> CaseResult {
    let row = gateway_row("row-1", "u1", "g-123", "gw-a");
    let out = store.upsert_account(row.clone()).await.map_err(|e| e.to_string())?;
    ensure(out.was_created(), "expected Created")?;
    ensure_eq(out.account(), &row, "returned row")?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found, row, "persisted row")
}

async fn upsert_keeps_identity(store: Arc<dyn AccountStore>) -> CaseResult {
    store
        .upsert_account(gateway_row("row-1", "u1", "g-1", "gw-a"))
        .await
        .map_err(|e| e.to_string())?;

    let later = t0() + Duration::seconds(300);
    let candidate = LinkedAccount::new_gateway(
        "row-2".into(),
        "u1",
        "g-other",
        &tokens("gw-b", "gw-b-r", later),
        later,
    );
    let out = store.upsert_account(candidate).await.map_err(|e| e.to_string())?;
    ensure(!out.was_created(), "expected Updated")?;

    let row = out.into_account();
    ensure_eq(row.id.as_str(), "row-1", "id")?;
    ensure_eq(row.account_id.as_str(), "g-1", "accountId")?;
    ensure_eq(row.created_at, t0(), "createdAt")?;
    ensure_eq(row.updated_at, later, "updatedAt")?;
    ensure_eq(row.access_token.as_deref(), Some("gw-b"), "accessToken")?;
    ensure_eq(row.refresh_token.as_deref(), Some("gw-b-r"), "refreshToken")?;
    ensure_eq(
        row.refresh_token_expires_at,
        Some(later + Duration::seconds(86400)),
        "refreshTokenExpiresAt",
    )?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found, row, "persisted row")
}

async fn upsert_with_stored_id_updates(store: Arc<dyn AccountStore>) -> CaseResult {
    let original = gateway_row("row-1", "u1", "g-1", "gw-a");
    store.insert_account(original.clone()).await.map_err(|e| e.to_string())?;

    let later = t0() + Duration::seconds(60);
    let mut candidate = original.clone();
    candidate.apply_tokens(&tokens("gw-b", "gw-b-r", later), later);
    let out = store.upsert_account(candidate).await.map_err(|e| e.to_string())?;
    ensure(!out.was_created(), "expected Updated for a candidate carrying the stored id")?;

    let row = out.into_account();
    ensure_eq(row.id.as_str(), "row-1", "id")?;
    ensure_eq(row.created_at, original.created_at, "createdAt")?;
    ensure_eq(row.access_token.as_deref(), Some("gw-b"), "accessToken")?;
    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    ensure_eq(found, row, "persisted row")
}

async fn empty_tokens_round_trip(store: Arc<dyn AccountStore>) -> CaseResult {
    let mut row = upstream_row("u1", "google");
    row.access_token = None;
    store.insert_account(row.clone()).await.map_err(|e| e.to_string())?;
    let found = find(store.as_ref(), "u1", "google").await?;
    ensure_eq(found, row, "row with null token columns")
}

async fn concurrent_upserts_converge(store: Arc<dyn AccountStore>) -> CaseResult {
    const WRITERS: usize = 8;

    let mut handles = Vec::with_capacity(WRITERS);
    for i in 0..WRITERS {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let row = gateway_row(&format!("row-{i}"), "u1", "g-1", &format!("gw-{i}"));
            store.upsert_account(row).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let out = handle
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        if out.was_created() {
            created += 1;
        }
    }
    ensure_eq(created, 1, "writers that created the row")?;

    let found = find(store.as_ref(), "u1", GATEWAY_PROVIDER_ID).await?;
    let winner = found
        .access_token
        .as_deref()
        .and_then(|t| t.strip_prefix("gw-"))
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or("final token is not one of the writers' tokens")?;
    ensure(winner < WRITERS, "final token is not one of the writers' tokens")?;
    ensure_eq(
        found.refresh_token.as_deref(),
        Some(format!("gw-{winner}-r").as_str()),
        "refresh token from the same writer",
    )
}
