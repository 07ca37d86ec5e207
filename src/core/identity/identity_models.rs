// Identity types shared by every feature module.
//
// The identity provider (an external collaborator) authenticates users and
// hands us a `Principal`. We trust it as-is - no verification happens here.

use serde::{Deserialize, Serialize};

/// An authenticated user as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl Principal {
    /// True when the caller has no usable identity (empty or blank id).
    pub fn is_anonymous(&self) -> bool {
        self.id.trim().is_empty()
    }
}

/// The author fields denormalized onto posts and comments.
///
/// Always built from a `Principal` at the call boundary, so loosely-typed
/// provider objects never reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<&Principal> for AuthorSnapshot {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id.clone(),
            name: principal.name.clone(),
            email: principal.email.clone(),
            avatar_url: principal.avatar_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_anonymous() {
        let mut user = Principal {
            id: "user-1".to_string(),
            name: "Aarav".to_string(),
            email: "aarav@student.example.edu".to_string(),
            avatar_url: None,
        };
        assert!(!user.is_anonymous());

        user.id = "   ".to_string();
        assert!(user.is_anonymous());
    }
}
