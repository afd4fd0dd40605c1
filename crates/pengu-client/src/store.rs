//! The client data synchronization store.
//!
//! One owned state container per running surface: every collection cache,
//! the current user, and the command methods that keep them in sync with the
//! server. The server is the source of truth; caches hold the last confirmed
//! copy and nothing is ever constructed client-side with a fabricated
//! permanent identifier.
//!
//! Session lifecycle lives here; the bulk loader is in [`crate::loader`],
//! write operations in [`crate::mutations`], and push-event handling in
//! [`crate::live`].

use crate::gateway::Gateway;
use crate::models::{
    CarouselSlide, Course, Entity, ExpertApplication, ExpertProfile, FinancialTransaction,
    Message, Notification, Order, PlatformSettings, Quote, Review, Role, ServiceRequest, Skill,
    SyllabusEvent, User, WithdrawalRequest,
};
use crate::normalize::decode;
use crate::notice::NoticeSender;
use crate::session::SessionFile;
use serde_json::{json, Value};

/// Replace the entry with a matching id, or append.
pub(crate) fn upsert<T: Entity>(cache: &mut Vec<T>, item: T) {
    match cache.iter_mut().find(|existing| existing.id() == item.id()) {
        Some(slot) => *slot = item,
        None => cache.push(item),
    }
}

pub(crate) fn remove_by_id<T: Entity>(cache: &mut Vec<T>, id: &str) {
    cache.retain(|existing| existing.id() != id);
}

pub struct Store<G> {
    pub(crate) gateway: G,
    pub(crate) session: SessionFile,
    pub(crate) notices: NoticeSender,

    pub current_user: Option<User>,
    /// True once every fetch of the last bulk load has settled, success or
    /// failure. Never left permanently false by a broken endpoint.
    pub is_initialized: bool,

    pub users: Vec<User>,
    pub experts: Vec<ExpertProfile>,
    pub carousel: Vec<CarouselSlide>,
    pub requests: Vec<ServiceRequest>,
    pub quotes: Vec<Quote>,
    pub orders: Vec<Order>,
    pub reviews: Vec<Review>,
    pub notifications: Vec<Notification>,
    pub messages: Vec<Message>,
    pub transactions: Vec<FinancialTransaction>,
    pub withdrawals: Vec<WithdrawalRequest>,
    pub applications: Vec<ExpertApplication>,
    pub skills: Vec<Skill>,
    pub syllabus: Vec<SyllabusEvent>,
    pub courses: Vec<Course>,
    pub settings: Option<PlatformSettings>,
}

impl<G: Gateway> Store<G> {
    /// Build a store, restoring identity from the session file if present.
    /// Collections start empty until the first [`Store::load_all`].
    pub fn new(gateway: G, session: SessionFile, notices: NoticeSender) -> Self {
        let current_user = session.load();
        if let Some(user) = &current_user {
            gateway.set_token(user.token.clone());
        }

        Self {
            gateway,
            session,
            notices,
            current_user,
            is_initialized: false,
            users: Vec::new(),
            experts: Vec::new(),
            carousel: Vec::new(),
            requests: Vec::new(),
            quotes: Vec::new(),
            orders: Vec::new(),
            reviews: Vec::new(),
            notifications: Vec::new(),
            messages: Vec::new(),
            transactions: Vec::new(),
            withdrawals: Vec::new(),
            applications: Vec::new(),
            skills: Vec::new(),
            syllabus: Vec::new(),
            courses: Vec::new(),
            settings: None,
        }
    }

    /// The gateway this store talks through.
    pub fn gateway_ref(&self) -> &G {
        &self.gateway
    }

    /// Every change to the current user is mirrored to the session file:
    /// write on set, delete on clear. This is the sole persistence boundary.
    pub(crate) fn set_current_user(&mut self, user: Option<User>) {
        match &user {
            Some(current) => {
                self.gateway.set_token(current.token.clone());
                if let Err(e) = self.session.store(current) {
                    log::warn!("failed to persist session: {e:#}");
                }
            }
            None => {
                self.gateway.set_token(None);
                if let Err(e) = self.session.clear() {
                    log::warn!("failed to clear session: {e:#}");
                }
            }
        }
        self.current_user = user;
    }

    pub(crate) fn role(&self) -> Option<Role> {
        self.current_user.as_ref().map(|user| user.role)
    }

    /// Role-appropriate informational notice for a pushed event.
    pub(crate) fn role_notice(&self, admin: &str, expert: &str, student: &str) {
        let message = match self.role() {
            Some(Role::Admin) => admin,
            Some(Role::Expert) => expert,
            Some(Role::Student) => student,
            None => return,
        };
        self.notices.info(message);
    }

    fn finish_login(&mut self, raw: Value, failure_notice: &str) -> bool {
        match decode::<User>(raw) {
            Ok(user) => {
                self.notices
                    .success(format!("Welcome back, {}", user.display_name()));
                self.set_current_user(Some(user));
                true
            }
            Err(e) => {
                log::error!("login response did not decode: {e}");
                self.notices.error(failure_notice);
                false
            }
        }
    }

    /// Authenticate with email and password. On success the normalized user
    /// becomes `current_user`, is persisted, and every cache is reloaded.
    /// Never propagates an error to the caller; `false` means failed.
    pub async fn login(&mut self, email: &str, password: &str) -> bool {
        let body = json!({ "email": email, "password": password });
        match self.gateway.post("/auth/login", body).await {
            Ok(raw) => {
                if !self.finish_login(raw, "Login failed") {
                    return false;
                }
                self.load_all().await;
                true
            }
            Err(e) => {
                self.notices.error(e.user_message("Login failed"));
                false
            }
        }
    }

    /// Authenticate with a federated identity token; same contract as
    /// [`Store::login`] against the alternate endpoint.
    pub async fn login_federated(
        &mut self,
        id_token: &str,
        role: Role,
        access_token: Option<&str>,
    ) -> bool {
        let body = json!({
            "token": id_token,
            "role": role,
            "accessToken": access_token,
        });
        match self.gateway.post("/auth/federated", body).await {
            Ok(raw) => {
                if !self.finish_login(raw, "Login failed") {
                    return false;
                }
                self.load_all().await;
                true
            }
            Err(e) => {
                self.notices.error(e.user_message("Login failed"));
                false
            }
        }
    }

    /// Create an account and start a session with it.
    pub async fn register(&mut self, name: &str, email: &str, password: &str, role: Role) -> bool {
        let body = json!({
            "name": name,
            "email": email,
            "password": password,
            "role": role,
        });
        match self.gateway.post("/auth/register", body).await {
            Ok(raw) => {
                if !self.finish_login(raw, "Registration failed") {
                    return false;
                }
                self.load_all().await;
                true
            }
            Err(e) => {
                self.notices.error(e.user_message("Registration failed"));
                false
            }
        }
    }

    /// End the session locally: no server round-trip, takes effect
    /// immediately, idempotent. Role-scoped caches are dropped; public
    /// collections survive until the next [`Store::load_all`].
    pub fn logout(&mut self) {
        self.set_current_user(None);
        self.clear_scoped();
        self.notices.info("Logged out");
    }

    /// Update the current user's profile. `current_user` is replaced with
    /// the server's normalized response on success and untouched on failure.
    pub async fn update_profile(&mut self, fields: Value) -> bool {
        if self.current_user.is_none() {
            self.notices.error("Not logged in");
            return false;
        }
        match self.gateway.put("/auth/profile", fields).await {
            Ok(raw) => match decode::<User>(raw) {
                Ok(mut user) => {
                    // Profile responses do not re-issue the bearer token.
                    if user.token.is_none() {
                        user.token = self
                            .current_user
                            .as_ref()
                            .and_then(|current| current.token.clone());
                    }
                    self.set_current_user(Some(user));
                    self.notices.success("Profile updated");
                    true
                }
                Err(e) => {
                    log::error!("profile response did not decode: {e}");
                    self.notices.error("Profile update failed");
                    false
                }
            },
            Err(e) => {
                self.notices.error(e.user_message("Profile update failed"));
                false
            }
        }
    }

    fn clear_scoped(&mut self) {
        self.users.clear();
        self.requests.clear();
        self.quotes.clear();
        self.orders.clear();
        self.reviews.clear();
        self.notifications.clear();
        self.messages.clear();
        self.transactions.clear();
        self.withdrawals.clear();
        self.applications.clear();
        self.skills.clear();
        self.syllabus.clear();
        self.courses.clear();
        self.settings = None;
    }
}
