// Operator accounts and role-based capability checks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Operator roles, in decreasing order of privilege. Stored in the
/// database in their display form (`"Super Admin"`, `"Admin"`,
/// `"Captain"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Captain,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::Admin => "Admin",
            Role::Captain => "Captain",
        }
    }

    /// Parse the stored textual form. Returns `None` for unknown strings.
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "Super Admin" => Some(Role::SuperAdmin),
            "Admin" => Some(Role::Admin),
            "Captain" => Some(Role::Captain),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An operator account row.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Captains are linked to the team they manage.
    pub team_id: Option<i64>,
}

impl User {
    /// Capability check consulted before every mutating engine call.
    /// Super Admins pass every check.
    pub fn has_role(&self, required: &[Role]) -> bool {
        self.role == Role::SuperAdmin || required.contains(&self.role)
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }
}

/// Fields for creating an operator account. The database layer assigns
/// the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub team_id: Option<i64>,
}

/// Hash a password with a fresh random salt.
///
/// Stored form is `"{salt_hex}${digest_hex}"` where
/// `digest = sha256(salt_bytes || password_bytes)`.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let digest = salted_digest(&salt, password);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Check a password against a stored `salt$digest` hash. Malformed stored
/// hashes never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let digest = salted_digest(&salt, password);
    // Fixed-length comparison over the full digest.
    digest.len() == expected.len()
        && digest
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn salted_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 1,
            full_name: "Test User".into(),
            username: "test".into(),
            password_hash: hash_password("secret"),
            role,
            team_id: None,
        }
    }

    #[test]
    fn role_round_trip() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Captain] {
            assert_eq!(Role::from_db(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_db("Owner"), None);
        assert_eq!(Role::from_db(""), None);
    }

    #[test]
    fn super_admin_passes_every_check() {
        let u = user(Role::SuperAdmin);
        assert!(u.has_role(&[Role::Admin]));
        assert!(u.has_role(&[Role::Captain]));
        assert!(u.has_role(&[]));
    }

    #[test]
    fn admin_passes_only_listed_roles() {
        let u = user(Role::Admin);
        assert!(u.has_role(&[Role::Admin]));
        assert!(u.has_role(&[Role::Admin, Role::Captain]));
        assert!(!u.has_role(&[Role::Captain]));
        assert!(!u.has_role(&[]));
    }

    #[test]
    fn captain_cannot_pass_admin_check() {
        let u = user(Role::Captain);
        assert!(!u.has_role(&[Role::Admin]));
        assert!(u.has_role(&[Role::Captain]));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("admin123");
        assert!(verify_password(&hash, "admin123"));
        assert!(!verify_password(&hash, "admin1234"));
        assert!(!verify_password(&hash, ""));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a, b);
        assert!(verify_password(&a, "same"));
        assert!(verify_password(&b, "same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("", "x"));
        assert!(!verify_password("no-separator", "x"));
        assert!(!verify_password("zz$zz", "x"));
        assert!(!verify_password("abcd$", "x"));
    }

    #[test]
    fn check_password_uses_stored_hash() {
        let u = user(Role::Admin);
        assert!(u.check_password("secret"));
        assert!(!u.check_password("wrong"));
    }
}
