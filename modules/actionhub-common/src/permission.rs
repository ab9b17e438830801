use crate::types::{PermissionLevel, UserRole};

/// Map a platform role plus subscription/VIP flags to a permission tier.
///
/// Role flags win over the subscription and VIP flags: a subscribed moderator
/// is a Moderator, a VIP broadcaster is the Broadcaster.
pub fn resolve_permission(role: UserRole, is_subscriber: bool, is_vip: bool) -> PermissionLevel {
    match role {
        UserRole::Moderator | UserRole::GlobalModerator | UserRole::Staff | UserRole::Admin => {
            PermissionLevel::Moderator
        }
        UserRole::Broadcaster => PermissionLevel::Broadcaster,
        UserRole::Viewer if is_subscriber => PermissionLevel::Subscriber,
        UserRole::Viewer if is_vip => PermissionLevel::Vip,
        UserRole::Viewer => PermissionLevel::Viewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAFF_ROLES: [UserRole; 4] = [
        UserRole::Moderator,
        UserRole::GlobalModerator,
        UserRole::Staff,
        UserRole::Admin,
    ];

    #[test]
    fn staff_roles_resolve_to_moderator_regardless_of_flags() {
        for role in STAFF_ROLES {
            for (sub, vip) in [(false, false), (true, false), (false, true), (true, true)] {
                assert_eq!(
                    resolve_permission(role, sub, vip),
                    PermissionLevel::Moderator,
                    "{role:?} sub={sub} vip={vip}"
                );
            }
        }
    }

    #[test]
    fn broadcaster_role_wins_over_flags() {
        assert_eq!(
            resolve_permission(UserRole::Broadcaster, true, true),
            PermissionLevel::Broadcaster
        );
        assert_eq!(
            resolve_permission(UserRole::Broadcaster, false, false),
            PermissionLevel::Broadcaster
        );
    }

    #[test]
    fn plain_viewer_uses_subscription_before_vip() {
        assert_eq!(
            resolve_permission(UserRole::Viewer, true, true),
            PermissionLevel::Subscriber
        );
        assert_eq!(
            resolve_permission(UserRole::Viewer, true, false),
            PermissionLevel::Subscriber
        );
        assert_eq!(
            resolve_permission(UserRole::Viewer, false, true),
            PermissionLevel::Vip
        );
        assert_eq!(
            resolve_permission(UserRole::Viewer, false, false),
            PermissionLevel::Viewer
        );
    }

    #[test]
    fn permission_levels_are_ordered() {
        assert!(PermissionLevel::Viewer < PermissionLevel::Vip);
        assert!(PermissionLevel::Vip < PermissionLevel::Subscriber);
        assert!(PermissionLevel::Subscriber < PermissionLevel::Moderator);
        assert!(PermissionLevel::Moderator < PermissionLevel::Broadcaster);
    }

    #[test]
    fn permission_index_and_name_forms() {
        assert_eq!(PermissionLevel::from_index(0), Some(PermissionLevel::Viewer));
        assert_eq!(
            PermissionLevel::from_index(4),
            Some(PermissionLevel::Broadcaster)
        );
        assert_eq!(PermissionLevel::from_index(5), None);
        assert_eq!(PermissionLevel::from_index(-1), None);
        assert_eq!("MOD".parse::<PermissionLevel>(), Ok(PermissionLevel::Moderator));
        assert!("owner".parse::<PermissionLevel>().is_err());
    }
}
