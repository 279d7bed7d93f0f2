//! Authorization policy. Pure functions of the actor and the resource; the
//! directory and lifecycle engine consult these and never re-derive them.

use uuid::Uuid;

use pledge_types::models::{Actor, Promise, Role};

/// The one place the role hierarchy is compared.
pub fn has_role_at_least(actor: &Actor, minimum: Role) -> bool {
    actor.role >= minimum
}

pub fn is_admin(actor: &Actor) -> bool {
    has_role_at_least(actor, Role::Admin)
}

pub fn can_edit_user(actor: &Actor, target_id: Uuid) -> bool {
    actor.id == target_id || is_admin(actor)
}

pub fn can_assign_role(actor: &Actor) -> bool {
    is_admin(actor)
}

pub fn can_edit_promise(actor: &Actor, promise: &Promise) -> bool {
    actor.id == promise.user_id || is_admin(actor)
}

pub fn can_delete_promise(actor: &Actor) -> bool {
    has_role_at_least(actor, Role::Moderator)
}

/// A progress entry is judged by its root: pass the root here, not the entry.
pub fn can_view_promise(actor: &Actor, promise: &Promise) -> bool {
    !promise.is_private || actor.id == promise.user_id || is_admin(actor)
}

/// Unfiltered listings: every promise, every account.
pub fn can_view_everything(actor: &Actor) -> bool {
    is_admin(actor)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pledge_types::models::{AuditFields, PromiseStatus};

    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
        }
    }

    fn promise_of(owner: &Actor, private: bool) -> Promise {
        Promise {
            id: Uuid::new_v4(),
            user_id: owner.id,
            parent_id: None,
            title: "Learn the cello".into(),
            description: String::new(),
            deadline: Utc::now(),
            status: PromiseStatus::Pending,
            is_private: private,
            audit: AuditFields::new(Utc::now()),
        }
    }

    #[test]
    fn users_edit_themselves_admins_edit_anyone() {
        let alice = actor(Role::User);
        let bob = actor(Role::User);
        let moderator = actor(Role::Moderator);
        let admin = actor(Role::Admin);

        assert!(can_edit_user(&alice, alice.id));
        assert!(!can_edit_user(&alice, bob.id));
        assert!(!can_edit_user(&moderator, bob.id));
        assert!(can_edit_user(&admin, bob.id));
    }

    #[test]
    fn only_admins_assign_roles() {
        assert!(!can_assign_role(&actor(Role::User)));
        assert!(!can_assign_role(&actor(Role::Moderator)));
        assert!(can_assign_role(&actor(Role::Admin)));
    }

    #[test]
    fn promise_edit_is_owner_or_admin() {
        let alice = actor(Role::User);
        let promise = promise_of(&alice, false);

        assert!(can_edit_promise(&alice, &promise));
        assert!(!can_edit_promise(&actor(Role::User), &promise));
        assert!(!can_edit_promise(&actor(Role::Moderator), &promise));
        assert!(can_edit_promise(&actor(Role::Admin), &promise));
    }

    #[test]
    fn deletion_needs_moderator_or_above() {
        assert!(!can_delete_promise(&actor(Role::User)));
        assert!(can_delete_promise(&actor(Role::Moderator)));
        assert!(can_delete_promise(&actor(Role::Admin)));
    }

    #[test]
    fn private_promises_are_owner_and_admin_only() {
        let alice = actor(Role::User);
        let private = promise_of(&alice, true);
        let public = promise_of(&alice, false);

        assert!(can_view_promise(&alice, &private));
        assert!(can_view_promise(&actor(Role::Admin), &private));
        assert!(!can_view_promise(&actor(Role::User), &private));
        assert!(!can_view_promise(&actor(Role::Moderator), &private));

        assert!(can_view_promise(&actor(Role::User), &public));
    }

    #[test]
    fn hierarchy_is_total() {
        let moderator = actor(Role::Moderator);
        assert!(has_role_at_least(&moderator, Role::User));
        assert!(has_role_at_least(&moderator, Role::Moderator));
        assert!(!has_role_at_least(&moderator, Role::Admin));
    }
}
