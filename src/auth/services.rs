//! Identity resolution and token lifecycle.
//!
//! Every operation is a short pipeline: validate input, verify the token
//! where one is presented, consult the cache before the store, and hand
//! cache population and performance recording to `BackgroundTasks` so the
//! caller never waits on them. A user is only returned when its stored
//! email matches the email the credential or token was issued for.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::claims::TokenClaims;
use super::jwt::TokenAuthority;
use super::password::Passwords;
use crate::cache::IdentityCache;
use crate::context::RequestContext;
use crate::domain::{normalize_email, Email, User};
use crate::error::{CacheError, IdentityError, StoreError, UserError};
use crate::perf::{Operation, PerformanceEvent, PerformanceRecorder};
use crate::store::CredentialStore;
use crate::tasks::BackgroundTasks;

/// Token plus the user it was issued for.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct DeleteStatus {
    pub timestamp: i64,
    pub message: &'static str,
}

/// Raw registration input, validated by `IdentityService::register`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub surname: String,
    pub password: String,
    pub is_recruiter: bool,
}

struct Served<T> {
    value: T,
    cache_hit: bool,
}

impl<T> Served<T> {
    fn hit(value: T) -> Self {
        Self { value, cache_hit: true }
    }

    fn miss(value: T) -> Self {
        Self { value, cache_hit: false }
    }
}

pub struct IdentityService {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn IdentityCache>,
    tokens: Arc<dyn TokenAuthority>,
    recorder: Arc<dyn PerformanceRecorder>,
    passwords: Passwords,
    background: BackgroundTasks,
    rw_timeout: Duration,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn IdentityCache>,
        tokens: Arc<dyn TokenAuthority>,
        recorder: Arc<dyn PerformanceRecorder>,
        passwords: Passwords,
        background: BackgroundTasks,
        rw_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            tokens,
            recorder,
            passwords,
            background,
            rw_timeout,
        }
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    #[instrument(skip_all)]
    pub async fn get_user_by_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<User, IdentityError> {
        let start = Instant::now();
        let res = self.resolve_token(ctx, token).await;
        self.finish(Operation::GetUserByToken, start, res)
    }

    #[instrument(skip_all)]
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, IdentityError> {
        let start = Instant::now();
        let res = self.authenticate(ctx, email, password).await;
        self.finish(Operation::Login, start, res)
    }

    #[instrument(skip_all)]
    pub async fn register(
        &self,
        ctx: &RequestContext,
        req: Registration,
    ) -> Result<AuthOutcome, IdentityError> {
        let start = Instant::now();
        let res = self.create(ctx, req).await;
        self.finish(Operation::Register, start, res)
    }

    /// Removes the account behind `token`. Cached copies are left to expire.
    #[instrument(skip_all)]
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<DeleteStatus, IdentityError> {
        let start = Instant::now();
        let res = self.remove(ctx, token).await;
        self.finish(Operation::Delete, start, res)
    }

    /// Issues a fresh token from a valid one. Existence is not re-checked.
    #[instrument(skip_all)]
    pub async fn refresh(&self, ctx: &RequestContext, token: &str) -> Result<String, IdentityError> {
        let start = Instant::now();
        let res = self.reissue(ctx, token);
        self.finish(Operation::Refresh, start, res)
    }

    async fn resolve_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Served<User>, IdentityError> {
        let claims = self.verified_claims(token)?;
        let ctx = ctx.child(self.rw_timeout);

        check(&ctx)?;
        if let Some(user) = self.from_cache(&ctx, self.cache.get_by_id(&ctx, claims.id)).await {
            ensure_same_identity(&user, &claims)?;
            return Ok(Served::hit(user));
        }

        check(&ctx)?;
        let user = match store_call(&ctx, self.store.get_by_id(&ctx, claims.id)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(IdentityError::UserDoesNotExist),
            Err(e) => {
                error!(error = %e, user_id = %claims.id, "failed to get user by id");
                return Err(store_failure(e));
            }
        };
        ensure_same_identity(&user, &claims)?;

        self.populate_by_id(user.clone());
        Ok(Served::miss(user))
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<Served<AuthOutcome>, IdentityError> {
        let email = normalize_email(email);
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidArgs);
        }
        let ctx = ctx.child(self.rw_timeout);

        check(&ctx)?;
        if let Some(user) = self.from_cache(&ctx, self.cache.get_by_email(&ctx, &email)).await {
            if !self.password_matches(&user, password).await {
                warn!(user_id = %user.id, "login invalid password");
                return Err(IdentityError::InvalidCredentials);
            }
            return Ok(Served::hit(self.auth_outcome(user)?));
        }

        check(&ctx)?;
        let user = match store_call(&ctx, self.store.get_by_email(&ctx, &email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!("login unknown email");
                return Err(IdentityError::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, "failed to get user by email");
                return Err(store_failure(e));
            }
        };
        if !self.password_matches(&user, password).await {
            warn!(user_id = %user.id, "login invalid password");
            return Err(IdentityError::InvalidCredentials);
        }

        self.populate_by_email(user.clone());
        Ok(Served::miss(self.auth_outcome(user)?))
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        req: Registration,
    ) -> Result<Served<AuthOutcome>, IdentityError> {
        let email = Email::parse(&req.email).map_err(|_| IdentityError::InvalidEmail)?;
        let passwords = self.passwords.clone();
        let user = tokio::task::spawn_blocking(move || {
            User::register(
                email,
                &req.name,
                &req.surname,
                &req.password,
                req.is_recruiter,
                &passwords,
            )
        })
        .await
        .map_err(|e| UserError::Hash(e.to_string()))
        .and_then(|res| res)
        .map_err(|e| {
            error!(error = %e, "failed to create new user");
            IdentityError::CreateUserFailed(e)
        })?;
        let ctx = ctx.child(self.rw_timeout);

        check(&ctx)?;
        let id = match store_call(&ctx, self.store.save(&ctx, &user)).await {
            Ok(id) => id,
            Err(StoreError::Conflict) => {
                warn!(email = %user.email, "email already registered");
                return Err(IdentityError::UserAlreadyExists);
            }
            Err(e) => {
                error!(error = %e, "failed to save user");
                return Err(store_failure(e));
            }
        };

        let user = User { id, ..user };
        info!(user_id = %user.id, "user registered");
        Ok(Served::miss(self.auth_outcome(user)?))
    }

    async fn remove(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Served<DeleteStatus>, IdentityError> {
        let claims = self.verified_claims(token)?;
        let ctx = ctx.child(self.rw_timeout);

        check(&ctx)?;
        match store_call(&ctx, self.store.delete(&ctx, claims.id)).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(IdentityError::UserDoesNotExist),
            Err(e) => {
                error!(error = %e, user_id = %claims.id, "failed to delete user");
                return Err(store_failure(e));
            }
        }

        info!(user_id = %claims.id, "user deleted");
        Ok(Served::miss(DeleteStatus {
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
            message: "user has been deleted",
        }))
    }

    fn reissue(&self, ctx: &RequestContext, token: &str) -> Result<Served<String>, IdentityError> {
        let claims = self.verified_claims(token)?;
        check(&ctx.child(self.rw_timeout))?;
        let token = self.issue(&claims.email, claims.id)?;
        Ok(Served::miss(token))
    }

    /// Argon2 runs on the blocking pool so request workers stay responsive.
    async fn password_matches(&self, user: &User, password: &str) -> bool {
        let passwords = self.passwords.clone();
        let user = user.clone();
        let password = password.to_string();
        match tokio::task::spawn_blocking(move || user.check_password(&password, &passwords)).await
        {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, "password verification task failed");
                false
            }
        }
    }

    fn verified_claims(&self, token: &str) -> Result<TokenClaims, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::NilToken);
        }
        self.tokens.verify(token).map_err(|e| {
            warn!(error = %e, "invalid token detected");
            IdentityError::InvalidToken
        })
    }

    fn issue(&self, email: &str, id: Uuid) -> Result<String, IdentityError> {
        self.tokens.issue(email, id).map_err(|e| {
            error!(error = %e, user_id = %id, "failed to generate new token");
            IdentityError::TokenGeneration(e)
        })
    }

    fn auth_outcome(&self, user: User) -> Result<AuthOutcome, IdentityError> {
        let token = self.issue(user.email.as_str(), user.id)?;
        Ok(AuthOutcome { token, user })
    }

    /// Any cache failure degrades to a miss.
    async fn from_cache<F>(&self, ctx: &RequestContext, lookup: F) -> Option<User>
    where
        F: Future<Output = Result<User, CacheError>>,
    {
        match ctx.run(lookup).await {
            Ok(Ok(user)) => Some(user),
            Ok(Err(CacheError::NotFound)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "cache read failed, falling back to store");
                None
            }
            Err(_) => {
                warn!("cache read timed out, falling back to store");
                None
            }
        }
    }

    fn populate_by_id(&self, user: User) {
        let cache = Arc::clone(&self.cache);
        let timeout = self.background.timeout();
        self.background.spawn("cache_set_by_id", async move {
            let ctx = RequestContext::with_timeout(timeout);
            cache.set_by_id(&ctx, &user).await
        });
    }

    fn populate_by_email(&self, user: User) {
        let cache = Arc::clone(&self.cache);
        let timeout = self.background.timeout();
        self.background.spawn("cache_set_by_email", async move {
            let ctx = RequestContext::with_timeout(timeout);
            cache.set_by_email(&ctx, &user).await
        });
    }

    fn finish<T>(
        &self,
        operation: Operation,
        start: Instant,
        res: Result<Served<T>, IdentityError>,
    ) -> Result<T, IdentityError> {
        let (outcome, cache_hit) = match &res {
            Ok(served) => ("ok", served.cache_hit),
            Err(e) => (e.code(), false),
        };
        let event = PerformanceEvent {
            operation,
            duration: start.elapsed(),
            outcome,
            cache_hit,
        };
        let recorder = Arc::clone(&self.recorder);
        self.background.spawn("performance_event", async move {
            recorder.record(event).await;
            Ok::<_, Infallible>(())
        });
        res.map(|served| served.value)
    }
}

fn check(ctx: &RequestContext) -> Result<(), IdentityError> {
    ctx.ensure_active().map_err(|_| IdentityError::Context)
}

/// Bounds a store call by the request deadline.
async fn store_call<T, F>(ctx: &RequestContext, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    ctx.run(call).await.map_err(|_| StoreError::Context)?
}

fn store_failure(e: StoreError) -> IdentityError {
    match e {
        StoreError::Context => IdentityError::Context,
        _ => IdentityError::Database,
    }
}

/// A token is only honoured for the identity it was issued to.
fn ensure_same_identity(user: &User, claims: &TokenClaims) -> Result<(), IdentityError> {
    if user.email.as_str() != claims.email {
        warn!(user_id = %user.id, "token email does not match stored identity");
        return Err(IdentityError::InvalidToken);
    }
    Ok(())
}
