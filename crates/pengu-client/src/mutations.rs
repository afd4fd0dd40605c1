//! Mutation handlers: one function per write operation.
//!
//! Uniform contract: call the gateway, normalize the response, merge it into
//! the matching collection cache, emit a success notice. On failure the
//! cache is left untouched and an error notice carries the server's message
//! when it sent one. No retry, no backoff, no idempotency tokens; a failed
//! mutation leaves state as it was and the user retries.
//!
//! Nothing here infers approval or completion locally beyond the two
//! documented derivations (`review_deliverable`, `submit_milestone`), and
//! even those send the derived payload to the server and then trust the
//! canonical copy it returns.

use crate::gateway::Gateway;
use crate::loader::Collection;
use crate::models::{
    CarouselSlide, Course, ExpertApplication, ExpertProfile, Message, MilestoneStatus,
    Notification, Order, OrderStatus, PlatformSettings, Quote, Review, ServiceRequest, Skill,
    SyllabusEvent, User, UserStatus, WithdrawalRequest,
};
use crate::normalize::{decode, decode_list};
use crate::store::{remove_by_id, upsert, Store};
use serde_json::{json, Value};

enum Verb {
    Post,
    Put,
    Patch,
    Delete,
}

impl<G: Gateway> Store<G> {
    async fn call(
        &self,
        verb: Verb,
        path: &str,
        body: Value,
        failure: &str,
    ) -> Option<Value> {
        let result = match verb {
            Verb::Post => self.gateway.post(path, body).await,
            Verb::Put => self.gateway.put(path, body).await,
            Verb::Patch => self.gateway.patch(path, body).await,
            Verb::Delete => self.gateway.delete(path).await,
        };
        match result {
            Ok(raw) => Some(raw),
            Err(e) => {
                self.notices.error(e.user_message(failure));
                None
            }
        }
    }

    fn decode_failure(&self, what: &str, e: serde_json::Error) -> bool {
        log::error!("{what} response did not decode: {e}");
        self.notices.error("Unexpected server response");
        false
    }

    /// Merge a response bundle carrying any of `quote`, `request`, `order`.
    /// Quote endpoints return the records their transition touched.
    fn merge_linked(&mut self, raw: Value) -> Result<(), serde_json::Error> {
        let Value::Object(mut parts) = raw else {
            return Ok(());
        };
        if let Some(value) = parts.remove("quote") {
            upsert(&mut self.quotes, decode::<Quote>(value)?);
        }
        if let Some(value) = parts.remove("request") {
            upsert(&mut self.requests, decode::<ServiceRequest>(value)?);
        }
        if let Some(value) = parts.remove("order") {
            upsert(&mut self.orders, decode::<Order>(value)?);
        }
        Ok(())
    }

    // ----- requests -----

    pub async fn create_request(&mut self, payload: Value) -> bool {
        let Some(raw) = self
            .call(Verb::Post, "/requests", payload, "Could not submit request")
            .await
        else {
            return false;
        };
        match decode::<ServiceRequest>(raw) {
            Ok(request) => {
                upsert(&mut self.requests, request);
                self.notices.success("Request submitted");
                true
            }
            Err(e) => self.decode_failure("request", e),
        }
    }

    pub async fn expire_request(&mut self, request_id: &str) -> bool {
        let path = format!("/requests/{request_id}/expire");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not expire request")
            .await
        else {
            return false;
        };
        match decode::<ServiceRequest>(raw) {
            Ok(request) => {
                upsert(&mut self.requests, request);
                self.notices.success("Request expired");
                true
            }
            Err(e) => self.decode_failure("request", e),
        }
    }

    // ----- quotes -----

    pub async fn create_quote(&mut self, request_id: &str, amount: f64, message: &str) -> bool {
        let body = json!({
            "requestId": request_id,
            "amount": amount,
            "message": message,
        });
        let Some(raw) = self
            .call(Verb::Post, "/quotes", body, "Could not send quote")
            .await
        else {
            return false;
        };
        match self.merge_linked(raw) {
            Ok(()) => {
                self.notices.success("Quote sent");
                true
            }
            Err(e) => self.decode_failure("quote", e),
        }
    }

    /// Append a counter-offer to the quote's negotiation history; the
    /// request moves to NEGOTIATION.
    pub async fn counter_quote(&mut self, quote_id: &str, amount: f64, message: &str) -> bool {
        let path = format!("/quotes/{quote_id}/counter");
        let body = json!({ "amount": amount, "message": message });
        let Some(raw) = self
            .call(Verb::Post, &path, body, "Could not send counter-offer")
            .await
        else {
            return false;
        };
        match self.merge_linked(raw) {
            Ok(()) => {
                self.notices.success("Counter-offer sent");
                true
            }
            Err(e) => self.decode_failure("quote", e),
        }
    }

    /// Accepting a quote is the trigger that creates the order: the server
    /// responds with the accepted quote, the converted request, and the new
    /// order, all merged here.
    pub async fn accept_quote(&mut self, quote_id: &str) -> bool {
        let path = format!("/quotes/{quote_id}/accept");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not accept quote")
            .await
        else {
            return false;
        };
        match self.merge_linked(raw) {
            Ok(()) => {
                self.notices.success("Quote accepted, order created");
                true
            }
            Err(e) => self.decode_failure("quote", e),
        }
    }

    pub async fn reject_quote(&mut self, quote_id: &str) -> bool {
        let path = format!("/quotes/{quote_id}/reject");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not reject quote")
            .await
        else {
            return false;
        };
        match self.merge_linked(raw) {
            Ok(()) => {
                self.notices.success("Quote rejected");
                true
            }
            Err(e) => self.decode_failure("quote", e),
        }
    }

    // ----- orders -----

    async fn order_transition(&mut self, path: String, body: Value, verb_failed: &str, done: &str) -> bool {
        let Some(raw) = self.call(Verb::Post, &path, body, verb_failed).await else {
            return false;
        };
        match decode::<Order>(raw) {
            Ok(order) => {
                upsert(&mut self.orders, order);
                self.notices.success(done);
                true
            }
            Err(e) => self.decode_failure("order", e),
        }
    }

    /// Admin confirms the payment behind a pending order.
    pub async fn verify_payment(&mut self, order_id: &str) -> bool {
        self.order_transition(
            format!("/orders/{order_id}/verify"),
            Value::Null,
            "Could not verify payment",
            "Payment confirmed",
        )
        .await
    }

    pub async fn assign_expert(&mut self, order_id: &str, expert_id: &str) -> bool {
        self.order_transition(
            format!("/orders/{order_id}/assign"),
            json!({ "expertId": expert_id }),
            "Could not assign expert",
            "Expert assigned",
        )
        .await
    }

    pub async fn start_order(&mut self, order_id: &str) -> bool {
        self.order_transition(
            format!("/orders/{order_id}/start"),
            Value::Null,
            "Could not start order",
            "Order started",
        )
        .await
    }

    pub async fn dispute_order(&mut self, order_id: &str, reason: &str) -> bool {
        self.order_transition(
            format!("/orders/{order_id}/dispute"),
            json!({ "reason": reason }),
            "Could not open dispute",
            "Dispute opened",
        )
        .await
    }

    pub async fn cancel_order(&mut self, order_id: &str) -> bool {
        self.order_transition(
            format!("/orders/{order_id}/cancel"),
            Value::Null,
            "Could not cancel order",
            "Order cancelled",
        )
        .await
    }

    /// Expert delivers a milestone: it becomes DELIVERED with the submitted
    /// files and the order enters `Review`. The derived payload is sent to
    /// the server, which persists it and returns the canonical order.
    pub async fn submit_milestone(
        &mut self,
        order_id: &str,
        milestone_id: &str,
        files: Vec<String>,
    ) -> bool {
        let Some(order) = self.orders.iter().find(|order| order.id == order_id) else {
            self.notices.error("Order not found");
            return false;
        };
        let mut milestones = order.milestones.clone();
        let Some(target) = milestones
            .iter_mut()
            .find(|milestone| milestone.id == milestone_id)
        else {
            self.notices.error("Milestone not found");
            return false;
        };
        target.status = MilestoneStatus::Delivered;
        target.files = files;

        let body = json!({
            "milestones": milestones,
            "status": OrderStatus::Review,
        });
        let path = format!("/orders/{order_id}");
        let Some(raw) = self
            .call(Verb::Put, &path, body, "Could not submit milestone")
            .await
        else {
            return false;
        };
        match decode::<Order>(raw) {
            Ok(order) => {
                upsert(&mut self.orders, order);
                self.notices.success("Milestone delivered for review");
                true
            }
            Err(e) => self.decode_failure("order", e),
        }
    }

    /// Student reviews a delivered milestone. The full milestone array is
    /// recomputed locally: the target becomes APPROVED (or reverts to
    /// IN_PROGRESS on rejection), progress is the rounded approval
    /// percentage, and the order is COMPLETED only at 100%.
    pub async fn review_deliverable(
        &mut self,
        order_id: &str,
        milestone_id: &str,
        approved: bool,
    ) -> bool {
        let Some(order) = self.orders.iter().find(|order| order.id == order_id) else {
            self.notices.error("Order not found");
            return false;
        };
        if order.milestones.is_empty() {
            self.notices.error("Order has no milestones");
            return false;
        }
        let mut milestones = order.milestones.clone();
        let Some(target) = milestones
            .iter_mut()
            .find(|milestone| milestone.id == milestone_id)
        else {
            self.notices.error("Milestone not found");
            return false;
        };
        target.status = if approved {
            MilestoneStatus::Approved
        } else {
            MilestoneStatus::InProgress
        };

        let total = milestones.len();
        let approved_count = milestones
            .iter()
            .filter(|milestone| milestone.status == MilestoneStatus::Approved)
            .count();
        let progress = ((approved_count as f64 / total as f64) * 100.0).round() as u8;
        let status = if progress == 100 {
            OrderStatus::Completed
        } else {
            OrderStatus::InProgress
        };

        let body = json!({
            "milestones": milestones,
            "progress": progress,
            "status": status,
        });
        let path = format!("/orders/{order_id}");
        let Some(raw) = self
            .call(Verb::Put, &path, body, "Could not review deliverable")
            .await
        else {
            return false;
        };
        match decode::<Order>(raw) {
            Ok(order) => {
                upsert(&mut self.orders, order);
                self.notices.success(if approved {
                    "Deliverable approved"
                } else {
                    "Deliverable sent back for revision"
                });
                true
            }
            Err(e) => self.decode_failure("order", e),
        }
    }

    // ----- experts -----

    pub async fn apply_as_expert(&mut self, payload: Value) -> bool {
        let Some(raw) = self
            .call(
                Verb::Post,
                "/expert-applications",
                payload,
                "Could not submit application",
            )
            .await
        else {
            return false;
        };
        match decode::<ExpertApplication>(raw) {
            Ok(application) => {
                upsert(&mut self.applications, application);
                self.notices.success("Application submitted");
                true
            }
            Err(e) => self.decode_failure("application", e),
        }
    }

    /// Admin approves or rejects an expert application. Approval creates an
    /// expert profile server-side, so the expert directory is re-fetched.
    pub async fn review_expert_application(&mut self, application_id: &str, approved: bool) -> bool {
        let path = format!("/expert-applications/{application_id}/review");
        let body = json!({ "approved": approved });
        let Some(raw) = self
            .call(Verb::Post, &path, body, "Could not review application")
            .await
        else {
            return false;
        };
        match decode::<ExpertApplication>(raw) {
            Ok(application) => {
                upsert(&mut self.applications, application);
                if approved {
                    self.refetch(Collection::Experts).await;
                }
                self.notices.success("Application reviewed");
                true
            }
            Err(e) => self.decode_failure("application", e),
        }
    }

    pub async fn update_expert_profile(&mut self, fields: Value) -> bool {
        let Some(raw) = self
            .call(Verb::Put, "/experts/profile", fields, "Could not update profile")
            .await
        else {
            return false;
        };
        match decode::<ExpertProfile>(raw) {
            Ok(profile) => {
                upsert(&mut self.experts, profile);
                self.notices.success("Expert profile updated");
                true
            }
            Err(e) => self.decode_failure("expert profile", e),
        }
    }

    async fn payout_method_call(&mut self, verb: Verb, path: String, body: Value, done: &str) -> bool {
        let Some(raw) = self
            .call(verb, &path, body, "Could not update payout methods")
            .await
        else {
            return false;
        };
        match decode::<ExpertProfile>(raw) {
            Ok(profile) => {
                upsert(&mut self.experts, profile);
                self.notices.success(done);
                true
            }
            Err(e) => self.decode_failure("expert profile", e),
        }
    }

    pub async fn add_payout_method(&mut self, payload: Value) -> bool {
        self.payout_method_call(
            Verb::Post,
            "/experts/payout-methods".to_string(),
            payload,
            "Payout method added",
        )
        .await
    }

    /// Removal matches the canonical `id` only; raw-key ambiguity is dealt
    /// with once at the normalization boundary, not re-checked here.
    pub async fn remove_payout_method(&mut self, method_id: &str) -> bool {
        self.payout_method_call(
            Verb::Delete,
            format!("/experts/payout-methods/{method_id}"),
            Value::Null,
            "Payout method removed",
        )
        .await
    }

    /// The server demotes the previous primary; the returned profile is the
    /// authoritative view of which single method is primary now.
    pub async fn set_primary_payout_method(&mut self, method_id: &str) -> bool {
        self.payout_method_call(
            Verb::Post,
            format!("/experts/payout-methods/{method_id}/primary"),
            Value::Null,
            "Primary payout method set",
        )
        .await
    }

    // ----- withdrawals -----

    pub async fn request_withdrawal(&mut self, amount: f64, payout_method_id: Option<&str>) -> bool {
        let body = json!({ "amount": amount, "payoutMethodId": payout_method_id });
        let Some(raw) = self
            .call(Verb::Post, "/withdrawals", body, "Could not request withdrawal")
            .await
        else {
            return false;
        };
        match decode::<WithdrawalRequest>(raw) {
            Ok(withdrawal) => {
                upsert(&mut self.withdrawals, withdrawal);
                self.notices.success("Withdrawal requested");
                true
            }
            Err(e) => self.decode_failure("withdrawal", e),
        }
    }

    pub async fn approve_withdrawal(&mut self, withdrawal_id: &str) -> bool {
        let path = format!("/withdrawals/{withdrawal_id}/approve");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not approve withdrawal")
            .await
        else {
            return false;
        };
        match decode::<WithdrawalRequest>(raw) {
            Ok(withdrawal) => {
                upsert(&mut self.withdrawals, withdrawal);
                self.notices.success("Withdrawal approved");
                true
            }
            Err(e) => self.decode_failure("withdrawal", e),
        }
    }

    /// Rejection refunds the reserved amount to the originating balance:
    /// the signed-in student's `pengu_credits` when the withdrawal is
    /// theirs, the matching expert profile's balance otherwise.
    pub async fn reject_withdrawal(&mut self, withdrawal_id: &str) -> bool {
        let path = format!("/withdrawals/{withdrawal_id}/reject");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not reject withdrawal")
            .await
        else {
            return false;
        };
        match decode::<WithdrawalRequest>(raw) {
            Ok(withdrawal) => {
                self.apply_refund(&withdrawal);
                upsert(&mut self.withdrawals, withdrawal);
                self.notices.success("Withdrawal rejected, amount refunded");
                true
            }
            Err(e) => self.decode_failure("withdrawal", e),
        }
    }

    fn apply_refund(&mut self, withdrawal: &WithdrawalRequest) {
        if let Some(student_id) = &withdrawal.student_id {
            let refunded = match &self.current_user {
                Some(user) if &user.id == student_id => {
                    let mut user = user.clone();
                    user.pengu_credits += withdrawal.amount;
                    Some(user)
                }
                _ => None,
            };
            if let Some(user) = refunded {
                self.set_current_user(Some(user));
            }
        } else if let Some(expert_id) = &withdrawal.expert_id {
            if let Some(profile) = self
                .experts
                .iter_mut()
                .find(|profile| &profile.id == expert_id)
            {
                profile.balance += withdrawal.amount;
            }
        }
    }

    pub async fn mark_withdrawal_paid(&mut self, withdrawal_id: &str) -> bool {
        let path = format!("/withdrawals/{withdrawal_id}/paid");
        let Some(raw) = self
            .call(Verb::Post, &path, Value::Null, "Could not mark withdrawal paid")
            .await
        else {
            return false;
        };
        match decode::<WithdrawalRequest>(raw) {
            Ok(withdrawal) => {
                upsert(&mut self.withdrawals, withdrawal);
                self.notices.success("Withdrawal marked paid");
                true
            }
            Err(e) => self.decode_failure("withdrawal", e),
        }
    }

    // ----- reviews, skills, syllabus, courses -----

    pub async fn submit_review(&mut self, order_id: &str, rating: f64, comment: &str) -> bool {
        let body = json!({ "orderId": order_id, "rating": rating, "comment": comment });
        let Some(raw) = self
            .call(Verb::Post, "/reviews", body, "Could not submit review")
            .await
        else {
            return false;
        };
        match decode::<Review>(raw) {
            Ok(review) => {
                upsert(&mut self.reviews, review);
                self.notices.success("Review submitted");
                true
            }
            Err(e) => self.decode_failure("review", e),
        }
    }

    pub async fn create_skill(&mut self, name: &str, category: Option<&str>) -> bool {
        let body = json!({ "name": name, "category": category });
        let Some(raw) = self
            .call(Verb::Post, "/skills", body, "Could not create skill")
            .await
        else {
            return false;
        };
        match decode::<Skill>(raw) {
            Ok(skill) => {
                upsert(&mut self.skills, skill);
                self.notices.success("Skill created");
                true
            }
            Err(e) => self.decode_failure("skill", e),
        }
    }

    pub async fn delete_skill(&mut self, skill_id: &str) -> bool {
        let path = format!("/skills/{skill_id}");
        if self
            .call(Verb::Delete, &path, Value::Null, "Could not delete skill")
            .await
            .is_none()
        {
            return false;
        }
        remove_by_id(&mut self.skills, skill_id);
        self.notices.success("Skill deleted");
        true
    }

    pub async fn add_syllabus_event(&mut self, payload: Value) -> bool {
        let Some(raw) = self
            .call(Verb::Post, "/syllabus", payload, "Could not add syllabus event")
            .await
        else {
            return false;
        };
        match decode::<SyllabusEvent>(raw) {
            Ok(event) => {
                upsert(&mut self.syllabus, event);
                self.notices.success("Syllabus event added");
                true
            }
            Err(e) => self.decode_failure("syllabus event", e),
        }
    }

    pub async fn delete_syllabus_event(&mut self, event_id: &str) -> bool {
        let path = format!("/syllabus/{event_id}");
        if self
            .call(Verb::Delete, &path, Value::Null, "Could not delete syllabus event")
            .await
            .is_none()
        {
            return false;
        }
        remove_by_id(&mut self.syllabus, event_id);
        self.notices.success("Syllabus event deleted");
        true
    }

    pub async fn create_course(&mut self, payload: Value) -> bool {
        let Some(raw) = self
            .call(Verb::Post, "/courses", payload, "Could not add course")
            .await
        else {
            return false;
        };
        match decode::<Course>(raw) {
            Ok(course) => {
                upsert(&mut self.courses, course);
                self.notices.success("Course added");
                true
            }
            Err(e) => self.decode_failure("course", e),
        }
    }

    // ----- messages & notifications -----

    pub async fn send_message(&mut self, recipient_id: &str, body_text: &str) -> bool {
        let body = json!({ "recipientId": recipient_id, "body": body_text });
        let Some(raw) = self
            .call(Verb::Post, "/messages", body, "Could not send message")
            .await
        else {
            return false;
        };
        match decode::<Message>(raw) {
            Ok(message) => {
                upsert(&mut self.messages, message);
                self.notices.success("Message sent");
                true
            }
            Err(e) => self.decode_failure("message", e),
        }
    }

    pub async fn mark_notification_read(&mut self, notification_id: &str) -> bool {
        let path = format!("/notifications/{notification_id}/read");
        let Some(raw) = self
            .call(Verb::Patch, &path, Value::Null, "Could not update notification")
            .await
        else {
            return false;
        };
        match decode::<Notification>(raw) {
            Ok(notification) => {
                upsert(&mut self.notifications, notification);
                true
            }
            Err(e) => self.decode_failure("notification", e),
        }
    }

    pub async fn mark_all_notifications_read(&mut self) -> bool {
        let Some(raw) = self
            .call(
                Verb::Post,
                "/notifications/read-all",
                Value::Null,
                "Could not update notifications",
            )
            .await
        else {
            return false;
        };
        match decode_list::<Notification>(raw) {
            Ok(notifications) => {
                self.notifications = notifications;
                true
            }
            Err(e) => self.decode_failure("notifications", e),
        }
    }

    // ----- admin: carousel, users, settings -----

    pub async fn create_slide(&mut self, payload: Value) -> bool {
        let Some(raw) = self
            .call(Verb::Post, "/carousel", payload, "Could not create slide")
            .await
        else {
            return false;
        };
        match decode::<CarouselSlide>(raw) {
            Ok(slide) => {
                upsert(&mut self.carousel, slide);
                self.notices.success("Slide created");
                true
            }
            Err(e) => self.decode_failure("slide", e),
        }
    }

    pub async fn update_slide(&mut self, slide_id: &str, payload: Value) -> bool {
        let path = format!("/carousel/{slide_id}");
        let Some(raw) = self
            .call(Verb::Put, &path, payload, "Could not update slide")
            .await
        else {
            return false;
        };
        match decode::<CarouselSlide>(raw) {
            Ok(slide) => {
                upsert(&mut self.carousel, slide);
                self.notices.success("Slide updated");
                true
            }
            Err(e) => self.decode_failure("slide", e),
        }
    }

    pub async fn delete_slide(&mut self, slide_id: &str) -> bool {
        let path = format!("/carousel/{slide_id}");
        if self
            .call(Verb::Delete, &path, Value::Null, "Could not delete slide")
            .await
            .is_none()
        {
            return false;
        }
        remove_by_id(&mut self.carousel, slide_id);
        self.notices.success("Slide deleted");
        true
    }

    /// Admin bans, suspends, or reactivates an account. Role changes do not
    /// exist as a client operation.
    pub async fn set_user_status(&mut self, user_id: &str, status: UserStatus) -> bool {
        let path = format!("/users/{user_id}/status");
        let body = json!({ "status": status });
        let Some(raw) = self
            .call(Verb::Patch, &path, body, "Could not update user")
            .await
        else {
            return false;
        };
        match decode::<User>(raw) {
            Ok(user) => {
                upsert(&mut self.users, user);
                self.notices.success("User updated");
                true
            }
            Err(e) => self.decode_failure("user", e),
        }
    }

    pub async fn update_commission_rate(&mut self, rate: f64) -> bool {
        let body = json!({ "commissionRate": rate });
        let Some(raw) = self
            .call(Verb::Put, "/system/settings", body, "Could not update settings")
            .await
        else {
            return false;
        };
        match decode::<PlatformSettings>(raw) {
            Ok(settings) => {
                self.settings = Some(settings);
                self.notices.success("Commission rate updated");
                true
            }
            Err(e) => self.decode_failure("settings", e),
        }
    }
}
