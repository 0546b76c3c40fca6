use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::IdentityConfig;

/// The signed-in user's profile as far as attribution is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl Profile {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
        }
    }

    /// Id written to `user_id`: the profile id, else the auth user id.
    pub fn attribution_id(&self) -> Option<Uuid> {
        self.id.or(self.user_id)
    }
}

impl From<&IdentityConfig> for Profile {
    fn from(cfg: &IdentityConfig) -> Self {
        Self {
            id: cfg.profile_id,
            user_id: cfg.user_id,
        }
    }
}

/// Read-only source of the current profile.
pub trait IdentityProvider: Send + Sync {
    fn profile(&self) -> Profile;
}

/// Profile fixed at startup from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    profile: Profile,
}

impl StaticIdentity {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }
}

impl IdentityProvider for StaticIdentity {
    fn profile(&self) -> Profile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution_prefers_profile_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let profile = Profile {
            id: Some(a),
            user_id: Some(b),
        };
        assert_eq!(profile.attribution_id(), Some(a));
        assert_eq!(Profile::for_user(b).attribution_id(), Some(b));
        assert_eq!(Profile::default().attribution_id(), None);
    }

    #[test]
    fn test_static_identity_from_config() {
        let user = Uuid::new_v4();
        let cfg = IdentityConfig {
            profile_id: None,
            user_id: Some(user),
        };
        let identity = StaticIdentity::new(Profile::from(&cfg));
        assert_eq!(identity.profile().attribution_id(), Some(user));
    }
}
