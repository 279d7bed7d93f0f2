//! Promise lifecycle engine: creation of roots and progress entries, the
//! forward-only status machine, privacy-aware reads, and deletion.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use pledge_types::api::{CreatePromiseRequest, UpdatePromiseRequest};
use pledge_types::models::{Actor, AuditFields, Promise, PromiseStatus};
use pledge_types::store::PromiseStore;

use crate::error::ApiError;
use crate::policy;

pub const MIN_TITLE_LEN: usize = 5;

pub struct PromiseEngine {
    store: Arc<dyn PromiseStore>,
}

impl PromiseEngine {
    pub fn new(store: Arc<dyn PromiseStore>) -> Self {
        Self { store }
    }

    /// The new promise is always owned by `actor`.
    pub fn create(&self, actor: &Actor, req: CreatePromiseRequest) -> Result<Promise, ApiError> {
        let title = validate_title(&req.title)?;
        let description = req.description.trim().to_string();
        let now = Utc::now();

        let promise = match req.parent_id {
            None => {
                let deadline = req.deadline.ok_or(ApiError::MissingDeadline)?;
                Promise {
                    id: Uuid::new_v4(),
                    user_id: actor.id,
                    parent_id: None,
                    title,
                    description,
                    deadline,
                    status: PromiseStatus::Pending,
                    is_private: req.is_private,
                    audit: AuditFields::new(now),
                }
            }
            Some(parent_id) => {
                let parent = self
                    .store
                    .promise_by_id(parent_id)?
                    .filter(|p| policy::can_view_promise(actor, p))
                    .ok_or(ApiError::ParentNotFound)?;
                if !parent.is_root() {
                    return Err(ApiError::InvalidParent);
                }
                if !policy::can_edit_promise(actor, &parent) {
                    return Err(ApiError::NotAllowedToUpdate);
                }
                let status = req
                    .status
                    .filter(|s| s.is_progress_state())
                    .ok_or(ApiError::InvalidStatus)?;

                // Deadline and privacy come from the root, whatever the caller sent
                Promise {
                    id: Uuid::new_v4(),
                    user_id: actor.id,
                    parent_id: Some(parent.id),
                    title,
                    description,
                    deadline: parent.deadline,
                    status,
                    is_private: parent.is_private,
                    audit: AuditFields::new(now),
                }
            }
        };

        self.store.insert_promise(&promise)?;
        info!(
            "Promise {} created by {} (parent: {:?}, status: {})",
            promise.id, actor.id, promise.parent_id, promise.status
        );
        Ok(promise)
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: UpdatePromiseRequest,
    ) -> Result<Promise, ApiError> {
        let mut promise = self.get(actor, id)?;

        if !policy::can_edit_promise(actor, &promise) {
            return Err(ApiError::NotAllowedToUpdate);
        }

        // Deadlines are fixed at creation for roots and entries alike
        if patch.deadline.is_some() {
            return Err(ApiError::ImmutableField("deadline"));
        }
        if !promise.is_root() && patch.is_private.is_some() {
            return Err(ApiError::ImmutableField("is_private"));
        }

        if let Some(next) = patch.status {
            if next != promise.status && !promise.status.can_advance_to(next) {
                return Err(ApiError::InvalidStatusTransition {
                    from: promise.status,
                    to: next,
                });
            }
        }

        let title = patch.title.as_deref().map(validate_title).transpose()?;

        if let Some(title) = title {
            promise.title = title;
        }
        if let Some(description) = patch.description {
            promise.description = description.trim().to_string();
        }
        if let Some(status) = patch.status {
            promise.status = status;
        }
        if let Some(is_private) = patch.is_private {
            promise.is_private = is_private;
        }
        promise.audit.touch(Utc::now());

        self.store.update_promise(&promise)?;
        Ok(promise)
    }

    /// Hard delete, moderators and admins only. A root takes its progress entries with it.
    pub fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ApiError> {
        if !policy::can_delete_promise(actor) {
            return Err(ApiError::Forbidden);
        }
        if !self.store.delete_promise(id)? {
            return Err(ApiError::PromiseNotFound);
        }
        info!("Promise {} deleted by {} ({})", id, actor.id, actor.role);
        Ok(())
    }

    pub fn get(&self, actor: &Actor, id: Uuid) -> Result<Promise, ApiError> {
        let promise = self
            .store
            .promise_by_id(id)?
            .ok_or(ApiError::PromiseNotFound)?;
        if !self.can_view(actor, &promise)? {
            return Err(ApiError::NotVisible);
        }
        Ok(promise)
    }

    /// Promises owned by `user_id`, minus those whose root the caller cannot see.
    pub fn list_by_user(&self, actor: &Actor, user_id: Uuid) -> Result<Vec<Promise>, ApiError> {
        let promises = self.store.promises_by_user(user_id)?;
        let mut visible = Vec::with_capacity(promises.len());
        for promise in promises {
            if self.can_view(actor, &promise)? {
                visible.push(promise);
            }
        }
        Ok(visible)
    }

    /// Everything for admins, public promises for everyone else.
    pub fn list_all(&self, actor: &Actor) -> Result<Vec<Promise>, ApiError> {
        if policy::can_view_everything(actor) {
            Ok(self.store.all_promises()?)
        } else {
            Ok(self.store.public_promises()?)
        }
    }

    /// Progress entries under a root the caller can see.
    pub fn progress(&self, actor: &Actor, root_id: Uuid) -> Result<Vec<Promise>, ApiError> {
        let root = self.get(actor, root_id)?;
        Ok(self.store.promises_by_parent(root.id)?)
    }

    /// Entries are visible exactly when their root is, whoever created them.
    fn can_view(&self, actor: &Actor, promise: &Promise) -> Result<bool, ApiError> {
        let Some(parent_id) = promise.parent_id else {
            return Ok(policy::can_view_promise(actor, promise));
        };
        match self.store.promise_by_id(parent_id)? {
            Some(root) => Ok(policy::can_view_promise(actor, &root)),
            None => Ok(policy::can_view_promise(actor, promise)),
        }
    }
}

fn validate_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        return Err(ApiError::InvalidTitle);
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone};
    use pledge_db::Database;
    use pledge_types::models::Role;

    use super::*;
    use crate::error::ErrorKind;

    fn engine() -> (PromiseEngine, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (PromiseEngine::new(db.clone()), db)
    }

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
        }
    }

    fn deadline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()
    }

    fn root_request(private: bool) -> CreatePromiseRequest {
        CreatePromiseRequest {
            title: "Run a marathon".into(),
            deadline: Some(deadline()),
            is_private: private,
            ..Default::default()
        }
    }

    fn progress_request(parent: Uuid, status: Option<PromiseStatus>) -> CreatePromiseRequest {
        CreatePromiseRequest {
            parent_id: Some(parent),
            title: "Ran the first 10k".into(),
            status,
            ..Default::default()
        }
    }

    fn status_patch(status: PromiseStatus) -> UpdatePromiseRequest {
        UpdatePromiseRequest {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn root_starts_pending_with_its_deadline() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);

        let mut req = root_request(true);
        req.status = Some(PromiseStatus::Completed);
        let root = engine.create(&alice, req).unwrap();

        assert_eq!(root.status, PromiseStatus::Pending);
        assert_eq!(root.deadline, deadline());
        assert_eq!(root.user_id, alice.id);
        assert!(root.is_private);
        assert!(root.is_root());
    }

    #[test]
    fn short_title_is_rejected_after_trimming() {
        let (engine, db) = engine();
        let mut req = root_request(false);
        req.title = "   Run    ".into();

        let err = engine.create(&actor(Role::User), req).unwrap_err();
        assert!(matches!(err, ApiError::InvalidTitle));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(db.all_promises().unwrap().is_empty());
    }

    #[test]
    fn root_without_deadline_is_not_persisted() {
        let (engine, db) = engine();
        let mut req = root_request(false);
        req.deadline = None;

        let err = engine.create(&actor(Role::User), req).unwrap_err();
        assert!(matches!(err, ApiError::MissingDeadline));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(db.all_promises().unwrap().is_empty());
    }

    #[test]
    fn progress_inherits_the_root_deadline() {
        let (engine, db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        let mut req = progress_request(root.id, Some(PromiseStatus::InProgress));
        req.deadline = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        let entry = engine.create(&alice, req).unwrap();

        assert_eq!(entry.parent_id, Some(root.id));
        assert_eq!(entry.status, PromiseStatus::InProgress);
        let stored = db.promise_by_id(entry.id).unwrap().unwrap();
        assert_eq!(stored.deadline, root.deadline);
    }

    #[test]
    fn progress_cannot_start_pending() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        assert!(matches!(
            engine.create(&alice, progress_request(root.id, Some(PromiseStatus::Pending))),
            Err(ApiError::InvalidStatus)
        ));
        assert!(matches!(
            engine.create(&alice, progress_request(root.id, None)),
            Err(ApiError::InvalidStatus)
        ));
        assert!(
            engine
                .create(&alice, progress_request(root.id, Some(PromiseStatus::Completed)))
                .is_ok()
        );
    }

    #[test]
    fn progress_needs_an_existing_visible_root() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let bob = actor(Role::User);

        assert!(matches!(
            engine.create(&alice, progress_request(Uuid::new_v4(), Some(PromiseStatus::InProgress))),
            Err(ApiError::ParentNotFound)
        ));

        let secret = engine.create(&alice, root_request(true)).unwrap();
        assert!(matches!(
            engine.create(&bob, progress_request(secret.id, Some(PromiseStatus::InProgress))),
            Err(ApiError::ParentNotFound)
        ));

        let public = engine.create(&alice, root_request(false)).unwrap();
        assert!(matches!(
            engine.create(&bob, progress_request(public.id, Some(PromiseStatus::InProgress))),
            Err(ApiError::NotAllowedToUpdate)
        ));

        let entry = engine
            .create(&alice, progress_request(public.id, Some(PromiseStatus::InProgress)))
            .unwrap();
        assert!(matches!(
            engine.create(&alice, progress_request(entry.id, Some(PromiseStatus::Completed))),
            Err(ApiError::InvalidParent)
        ));
    }

    #[test]
    fn progress_copies_root_privacy() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(true)).unwrap();

        let mut req = progress_request(root.id, Some(PromiseStatus::InProgress));
        req.is_private = false;
        let entry = engine.create(&alice, req).unwrap();
        assert!(entry.is_private);
    }

    #[test]
    fn pending_can_jump_to_completed() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        let updated = engine
            .update(&alice, root.id, status_patch(PromiseStatus::Completed))
            .unwrap();
        assert_eq!(updated.status, PromiseStatus::Completed);
    }

    #[test]
    fn status_never_moves_backwards() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        engine
            .update(&alice, root.id, status_patch(PromiseStatus::InProgress))
            .unwrap();
        let err = engine
            .update(&alice, root.id, status_patch(PromiseStatus::Pending))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidStatusTransition {
                from: PromiseStatus::InProgress,
                to: PromiseStatus::Pending,
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidStatusTransition);
    }

    #[test]
    fn completed_is_terminal_but_repeating_it_is_a_no_op() {
        let (engine, db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();
        engine
            .update(&alice, root.id, status_patch(PromiseStatus::Completed))
            .unwrap();

        for next in [PromiseStatus::Pending, PromiseStatus::InProgress] {
            assert!(matches!(
                engine.update(&alice, root.id, status_patch(next)),
                Err(ApiError::InvalidStatusTransition { .. })
            ));
        }
        assert!(
            engine
                .update(&alice, root.id, status_patch(PromiseStatus::Completed))
                .is_ok()
        );
        let stored = db.promise_by_id(root.id).unwrap().unwrap();
        assert_eq!(stored.status, PromiseStatus::Completed);
    }

    #[test]
    fn rejected_transition_leaves_the_record_untouched() {
        let (engine, db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();
        engine
            .update(&alice, root.id, status_patch(PromiseStatus::Completed))
            .unwrap();

        let patch = UpdatePromiseRequest {
            title: Some("A brand new title".into()),
            status: Some(PromiseStatus::Pending),
            ..Default::default()
        };
        assert!(engine.update(&alice, root.id, patch).is_err());
        let stored = db.promise_by_id(root.id).unwrap().unwrap();
        assert_eq!(stored.title, "Run a marathon");
    }

    #[test]
    fn strangers_cannot_update() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let bob = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        let err = engine
            .update(&bob, root.id, status_patch(PromiseStatus::InProgress))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAllowedToUpdate));
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn admins_update_anyones_promise() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(true)).unwrap();

        let patch = UpdatePromiseRequest {
            title: Some("Run two marathons".into()),
            is_private: Some(false),
            ..Default::default()
        };
        let updated = engine.update(&actor(Role::Admin), root.id, patch).unwrap();
        assert_eq!(updated.title, "Run two marathons");
        assert!(!updated.is_private);
    }

    #[test]
    fn deadlines_are_immutable() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();
        let entry = engine
            .create(&alice, progress_request(root.id, Some(PromiseStatus::InProgress)))
            .unwrap();

        for id in [root.id, entry.id] {
            let patch = UpdatePromiseRequest {
                deadline: Some(Utc::now()),
                ..Default::default()
            };
            assert!(matches!(
                engine.update(&alice, id, patch),
                Err(ApiError::ImmutableField("deadline"))
            ));
        }
    }

    #[test]
    fn progress_privacy_is_immutable() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();
        let entry = engine
            .create(&alice, progress_request(root.id, Some(PromiseStatus::InProgress)))
            .unwrap();

        let patch = UpdatePromiseRequest {
            is_private: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            engine.update(&alice, entry.id, patch),
            Err(ApiError::ImmutableField("is_private"))
        ));
    }

    #[test]
    fn retitling_is_validated() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        let patch = UpdatePromiseRequest {
            title: Some(" abc ".into()),
            ..Default::default()
        };
        assert!(matches!(
            engine.update(&alice, root.id, patch),
            Err(ApiError::InvalidTitle)
        ));
    }

    #[test]
    fn only_moderators_and_admins_delete() {
        let (engine, db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();

        let err = engine.delete(&alice, root.id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
        assert_eq!(err.kind(), ErrorKind::Authorization);

        engine.delete(&actor(Role::Moderator), root.id).unwrap();
        assert!(db.promise_by_id(root.id).unwrap().is_none());
        assert!(matches!(
            engine.delete(&actor(Role::Admin), root.id),
            Err(ApiError::PromiseNotFound)
        ));
    }

    #[test]
    fn private_promise_is_hidden_from_strangers() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(true)).unwrap();

        assert!(engine.get(&alice, root.id).is_ok());
        assert!(engine.get(&actor(Role::Admin), root.id).is_ok());

        let err = engine.get(&actor(Role::Moderator), root.id).unwrap_err();
        assert!(matches!(err, ApiError::NotVisible));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Update reports the same not-found
        assert!(matches!(
            engine.update(&actor(Role::User), root.id, status_patch(PromiseStatus::Completed)),
            Err(ApiError::NotVisible)
        ));
    }

    #[test]
    fn listing_another_user_hides_private_roots_and_their_progress() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let public = engine.create(&alice, root_request(false)).unwrap();
        let private = engine.create(&alice, root_request(true)).unwrap();
        engine
            .create(&alice, progress_request(private.id, Some(PromiseStatus::InProgress)))
            .unwrap();

        let seen_by_bob = engine.list_by_user(&actor(Role::User), alice.id).unwrap();
        assert_eq!(seen_by_bob.len(), 1);
        assert_eq!(seen_by_bob[0].id, public.id);

        assert_eq!(engine.list_by_user(&alice, alice.id).unwrap().len(), 3);
        assert_eq!(engine.list_by_user(&actor(Role::Admin), alice.id).unwrap().len(), 3);
    }

    #[test]
    fn making_a_root_private_hides_existing_progress() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let bob = actor(Role::User);
        let root = engine.create(&alice, root_request(false)).unwrap();
        let entry = engine
            .create(&alice, progress_request(root.id, Some(PromiseStatus::InProgress)))
            .unwrap();
        assert!(engine.get(&bob, entry.id).is_ok());

        let patch = UpdatePromiseRequest {
            is_private: Some(true),
            ..Default::default()
        };
        engine.update(&alice, root.id, patch).unwrap();

        assert!(matches!(engine.get(&bob, entry.id), Err(ApiError::NotVisible)));
        assert!(engine.list_by_user(&bob, alice.id).unwrap().is_empty());
    }

    #[test]
    fn admin_entry_under_a_private_root_is_visible_to_the_root_owner() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let admin = actor(Role::Admin);
        let root = engine.create(&alice, root_request(true)).unwrap();
        let entry = engine
            .create(&admin, progress_request(root.id, Some(PromiseStatus::InProgress)))
            .unwrap();
        assert_eq!(entry.user_id, admin.id);

        assert_eq!(engine.get(&alice, entry.id).unwrap().id, entry.id);
        assert_eq!(engine.progress(&alice, root.id).unwrap().len(), 1);
        let listed = engine.list_by_user(&alice, admin.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, entry.id);

        let bob = actor(Role::User);
        assert!(matches!(engine.get(&bob, entry.id), Err(ApiError::NotVisible)));
        assert!(engine.list_by_user(&bob, admin.id).unwrap().is_empty());
    }

    #[test]
    fn list_all_is_public_only_unless_admin() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        engine.create(&alice, root_request(false)).unwrap();
        engine.create(&alice, root_request(true)).unwrap();

        assert_eq!(engine.list_all(&actor(Role::User)).unwrap().len(), 1);
        assert_eq!(engine.list_all(&alice).unwrap().len(), 1);
        assert_eq!(engine.list_all(&actor(Role::Moderator)).unwrap().len(), 1);
        assert_eq!(engine.list_all(&actor(Role::Admin)).unwrap().len(), 2);
    }

    #[test]
    fn progress_listing_respects_root_visibility() {
        let (engine, _db) = engine();
        let alice = actor(Role::User);
        let root = engine.create(&alice, root_request(true)).unwrap();
        engine
            .create(&alice, progress_request(root.id, Some(PromiseStatus::InProgress)))
            .unwrap();
        engine
            .create(&alice, progress_request(root.id, Some(PromiseStatus::Completed)))
            .unwrap();

        assert_eq!(engine.progress(&alice, root.id).unwrap().len(), 2);
        assert!(matches!(
            engine.progress(&actor(Role::User), root.id),
            Err(ApiError::NotVisible)
        ));
    }
}
