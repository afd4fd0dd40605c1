//! Role-conditioned bulk loader.
//!
//! Seeds every collection cache whenever the current user changes: fire all
//! fetches concurrently, normalize each response independently, and only
//! flip `is_initialized` once every fetch has settled. A single failed
//! endpoint is logged and leaves that one collection at its previous value.

use crate::gateway::Gateway;
use crate::models::{PlatformSettings, Role};
use crate::normalize::{decode, decode_list};
use crate::store::Store;
use futures_util::future::join_all;
use serde_json::Value;

/// One cache slot per entity type the loader can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Experts,
    Carousel,
    Requests,
    Quotes,
    Orders,
    Reviews,
    Notifications,
    Messages,
    Transactions,
    Withdrawals,
    Applications,
    Skills,
    Syllabus,
    Courses,
    Settings,
}

impl<G: Gateway> Store<G> {
    /// The per-role fetch list. Public collections always load; admins get
    /// the unscoped form of everything; experts and students get the
    /// caller-scoped forms plus their role-appropriate subsets.
    fn fetch_plan(&self) -> Vec<(Collection, &'static str)> {
        use Collection::*;

        let mut plan = vec![(Experts, "/experts"), (Carousel, "/carousel")];

        let Some(role) = self.role() else {
            return plan;
        };

        plan.push((Settings, "/system/settings"));

        match role {
            Role::Admin => {
                plan.extend([
                    (Users, "/users"),
                    (Requests, "/requests"),
                    (Quotes, "/quotes"),
                    (Orders, "/orders"),
                    (Reviews, "/reviews"),
                    (Notifications, "/notifications"),
                    (Messages, "/messages"),
                    (Transactions, "/transactions"),
                    (Withdrawals, "/withdrawals"),
                    (Applications, "/expert-applications"),
                    (Skills, "/skills"),
                ]);
            }
            Role::Expert => {
                plan.extend([
                    (Requests, "/requests/open"),
                    (Quotes, "/quotes/mine"),
                    (Orders, "/orders/mine"),
                    (Reviews, "/reviews/mine"),
                    (Notifications, "/notifications/mine"),
                    (Messages, "/messages"),
                    (Transactions, "/transactions"),
                    (Withdrawals, "/withdrawals/mine"),
                    (Skills, "/skills"),
                ]);
            }
            Role::Student => {
                plan.extend([
                    (Requests, "/requests/mine"),
                    (Quotes, "/quotes/mine"),
                    (Orders, "/orders/mine"),
                    (Reviews, "/reviews/mine"),
                    (Notifications, "/notifications/mine"),
                    (Messages, "/messages"),
                    (Transactions, "/transactions"),
                    (Withdrawals, "/withdrawals/mine"),
                    (Syllabus, "/syllabus/mine"),
                    (Courses, "/courses/mine"),
                ]);
            }
        }

        plan
    }

    /// Fan-out/fan-in: issue every fetch of the plan concurrently, then
    /// apply whatever settled. Failures never block readiness.
    pub async fn load_all(&mut self) {
        self.is_initialized = false;

        let plan = self.fetch_plan();
        let results = {
            let gateway = &self.gateway;
            let fetches = plan.iter().map(|(slot, path)| async move {
                (*slot, *path, gateway.get(path).await)
            });
            join_all(fetches).await
        };

        for (slot, path, result) in results {
            match result {
                Ok(raw) => self.apply_collection(slot, raw),
                Err(e) => log::warn!("bulk load of {path} failed: {e}"),
            }
        }

        self.is_initialized = true;
    }

    /// Wholesale re-fetch of one collection in its role-scoped form, used by
    /// the live-update listener. Collections outside the current role's plan
    /// are ignored.
    pub(crate) async fn refetch(&mut self, slot: Collection) {
        let Some(path) = self
            .fetch_plan()
            .into_iter()
            .find(|(planned, _)| *planned == slot)
            .map(|(_, path)| path)
        else {
            return;
        };

        match self.gateway.get(path).await {
            Ok(raw) => self.apply_collection(slot, raw),
            Err(e) => log::warn!("refetch of {path} failed: {e}"),
        }
    }

    /// Normalize and install one collection response. A response that does
    /// not decode leaves the previous value in place.
    fn apply_collection(&mut self, slot: Collection, raw: Value) {
        macro_rules! install {
            ($field:ident) => {
                match decode_list(raw) {
                    Ok(items) => self.$field = items,
                    Err(e) => log::warn!("response for {:?} did not decode: {e}", slot),
                }
            };
        }

        match slot {
            Collection::Users => install!(users),
            Collection::Experts => install!(experts),
            Collection::Carousel => install!(carousel),
            Collection::Requests => install!(requests),
            Collection::Quotes => install!(quotes),
            Collection::Orders => install!(orders),
            Collection::Reviews => install!(reviews),
            Collection::Notifications => install!(notifications),
            Collection::Messages => install!(messages),
            Collection::Transactions => install!(transactions),
            Collection::Withdrawals => install!(withdrawals),
            Collection::Applications => install!(applications),
            Collection::Skills => install!(skills),
            Collection::Syllabus => install!(syllabus),
            Collection::Courses => install!(courses),
            Collection::Settings => match decode::<PlatformSettings>(raw) {
                Ok(settings) => self.settings = Some(settings),
                Err(e) => log::warn!("settings response did not decode: {e}"),
            },
        }
    }
}
