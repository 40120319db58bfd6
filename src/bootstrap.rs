//! Session and profile bootstrap
//!
//! [`AuthView`] is the root component: on mount it reads the current session,
//! follows session changes for as long as it lives, and makes sure every
//! signed-in user has a profile row, creating a `comprador` profile on first
//! sign-in.
//!
//! Every session it handles (the initial one and each change) gets a
//! generation number. Results are only applied while their generation is the
//! latest, so a slow lookup for an old session can never overwrite the state of
//! a newer one.

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::auth::{OAuthProvider, Session, SessionSubscription, User};
use crate::error::{Error, Result};
use crate::gateway::{decode, Gateway};
use crate::models::{NewProfile, Profile, UserRole, PROFILES_TABLE};
use crate::postgrest::Filter;
use crate::view::{render, View};

/// What the root component knows about the signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    /// True from mount until the first session (and its profile) resolved
    pub loading: bool,
    pub user: Option<User>,
    pub profile: Option<Profile>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            loading: true,
            user: None,
            profile: None,
        }
    }
}

impl AuthState {
    pub fn role(&self) -> Option<UserRole> {
        self.profile.as_ref().map(|p| p.role)
    }
}

struct Shared {
    state: watch::Sender<AuthState>,
    generation: AtomicU64,
    active: AtomicBool,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply `update` if `generation` is still current and the view is mounted
    fn commit<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut AuthState),
    {
        self.state.send_if_modified(|state| {
            if !self.active.load(Ordering::SeqCst) {
                return false;
            }
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding result of superseded session #{}", generation);
                return false;
            }
            update(state);
            true
        })
    }
}

/// Root component driving sign-in state
pub struct AuthView<G: Gateway + 'static> {
    gateway: Arc<G>,
    shared: Arc<Shared>,
    callback_url: String,
    listener: Option<JoinHandle<()>>,
}

impl<G: Gateway + 'static> AuthView<G> {
    /// Mount the component.
    ///
    /// Subscribes to session changes, then resolves the current session in the
    /// background. Must be called inside a Tokio runtime.
    pub fn mount(gateway: Arc<G>, callback_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let shared = Arc::new(Shared {
            state,
            generation: AtomicU64::new(0),
            active: AtomicBool::new(true),
        });

        // Subscribe before the first read so no change can slip in between
        let subscription = gateway.on_session_change();
        let listener = tokio::spawn(listen(gateway.clone(), shared.clone(), subscription));

        Self {
            gateway,
            shared,
            callback_url: callback_url.into(),
            listener: Some(listener),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.shared.state.borrow().clone()
    }

    /// Watch the state as it changes
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    /// Wait until loading is over and return the state at that point
    pub async fn loaded(&self) -> AuthState {
        let mut receiver = self.watch();
        let state = match receiver.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// The view for the current state
    pub fn view(&self) -> View {
        render(&self.state())
    }

    /// Start Google sign-in; returns the URL to send the user to
    pub async fn sign_in_with_google(&self) -> Option<String> {
        match self
            .gateway
            .sign_in_with_provider(OAuthProvider::Google, &self.callback_url)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                error!("Error signing in: {}", e);
                None
            }
        }
    }

    /// Sign out; the session change that follows clears the state
    pub async fn sign_out(&self) {
        if let Err(e) = self.gateway.sign_out().await {
            error!("Error signing out: {}", e);
        }
    }

    /// Tear the component down; no state changes happen afterwards
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl<G: Gateway + 'static> Drop for AuthView<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn listen<G: Gateway + 'static>(gateway: Arc<G>, shared: Arc<Shared>, mut subscription: SessionSubscription) {
    // Dropping the set (when this task is aborted) aborts every pending apply
    let mut pending = JoinSet::new();

    let generation = shared.next_generation();
    pending.spawn(initial_session(gateway.clone(), shared.clone(), generation));

    loop {
        tokio::select! {
            change = subscription.changed() => match change {
                Some(change) => {
                    let generation = shared.next_generation();
                    info!("Session change {:?} (#{})", change.event, generation);
                    pending.spawn(apply_session(gateway.clone(), shared.clone(), generation, change.session));
                }
                None => break,
            },
            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                if let Err(e) = joined {
                    warn!("Session task ended abnormally: {}", e);
                }
            }
        }
    }

    while pending.join_next().await.is_some() {}
}

async fn initial_session<G: Gateway>(gateway: Arc<G>, shared: Arc<Shared>, generation: u64) {
    let session = match gateway.get_session().await {
        Ok(session) => session,
        Err(e) => {
            error!("Error getting session: {}", e);
            None
        }
    };
    apply_session(gateway, shared, generation, session).await;
}

async fn apply_session<G: Gateway>(gateway: Arc<G>, shared: Arc<Shared>, generation: u64, session: Option<Session>) {
    let user = match session {
        Some(session) => session.user,
        None => {
            shared.commit(generation, |state| {
                state.user = None;
                state.profile = None;
                state.loading = false;
            });
            return;
        }
    };

    let user_id = user.id.clone();
    let still_current = shared.commit(generation, |state| {
        if state.user.as_ref().map(|u| u.id.as_str()) != Some(user_id.as_str()) {
            state.profile = None;
        }
        state.user = Some(user);
    });
    if !still_current {
        return;
    }

    let profile = resolve_profile(gateway.as_ref(), &user_id).await;

    shared.commit(generation, |state| {
        if let Some(profile) = profile {
            state.profile = Some(profile);
        }
        state.loading = false;
    });
}

/// The profile for `user_id`, created on first sign-in.
///
/// `None` means the profile could not be resolved; the error has been logged.
async fn resolve_profile<G: Gateway + ?Sized>(gateway: &G, user_id: &str) -> Option<Profile> {
    match fetch_profile(gateway, user_id).await {
        Ok(profile) => Some(profile),
        Err(e) if e.is_not_found() => match create_profile(gateway, user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Error creating profile: {}", e);
                None
            }
        },
        Err(e) => {
            error!("Error fetching profile: {}", e);
            None
        }
    }
}

/// Read the profile row with exactly this id
pub async fn fetch_profile<G: Gateway + ?Sized>(gateway: &G, user_id: &str) -> Result<Profile> {
    let row = gateway
        .select_one(PROFILES_TABLE, &[Filter::eq("id", user_id)])
        .await?;
    decode(row)
}

/// The profile a first sign-in gets
pub fn new_profile_for(user_id: &str, user: &User) -> Result<NewProfile> {
    let email = user
        .email
        .clone()
        .filter(|email| !email.is_empty())
        .ok_or_else(|| Error::auth(format!("User {} has no email", user.id)))?;

    Ok(NewProfile {
        id: user_id.to_string(),
        email,
        full_name: user.metadata_str("full_name"),
        avatar_url: user.metadata_str("avatar_url"),
        role: UserRole::Comprador,
    })
}

/// Insert a `comprador` profile built from the current auth user
async fn create_profile<G: Gateway + ?Sized>(gateway: &G, user_id: &str) -> Result<Option<Profile>> {
    let user = match gateway.get_current_user().await? {
        Some(user) => user,
        None => {
            warn!("No current user, profile for {} not created", user_id);
            return Ok(None);
        }
    };

    let new_profile = new_profile_for(user_id, &user)?;
    let row = gateway
        .insert(PROFILES_TABLE, serde_json::to_value(&new_profile)?)
        .await?;
    info!("Created profile for {}", user_id);
    decode(row).map(Some)
}
