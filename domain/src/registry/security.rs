//! Security descriptor subset used to regain write access to a key
//!
//! Only what ownership takeover needs is modelled: an owner SID and an
//! ordered list of allow/deny entries. SIDs are kept in their string form
//! (`S-1-5-18`); binary encoding is left to the platform adapter.

use serde::{Deserialize, Serialize};

/// Full control over a registry key (`KEY_ALL_ACCESS`)
pub const KEY_ALL_ACCESS: u32 = 0x000F_003F;
/// `KEY_QUERY_VALUE`
pub const KEY_QUERY_VALUE: u32 = 0x0001;
/// `KEY_SET_VALUE`
pub const KEY_SET_VALUE: u32 = 0x0002;
/// `KEY_CREATE_SUB_KEY`
pub const KEY_CREATE_SUB_KEY: u32 = 0x0004;

/// `OBJECT_INHERIT_ACE | CONTAINER_INHERIT_ACE`
pub const INHERIT_TO_CHILDREN: u8 = 0x01 | 0x02;

/// A security identifier in string form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sid(String);

impl Sid {
    /// `BUILTIN\Administrators`
    pub const ADMINISTRATORS: &'static str = "S-1-5-32-544";
    /// `NT AUTHORITY\SYSTEM`
    pub const LOCAL_SYSTEM: &'static str = "S-1-5-18";

    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    pub fn administrators() -> Self {
        Self::new(Self::ADMINISTRATORS)
    }

    pub fn local_system() -> Self {
        Self::new(Self::LOCAL_SYSTEM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AceType {
    Allow,
    Deny,
}

/// One access control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub ace_type: AceType,
    pub sid: Sid,
    pub access_mask: u32,
    /// Raw inheritance flags
    pub flags: u8,
}

impl Ace {
    pub fn allow(sid: Sid, access_mask: u32) -> Self {
        Self {
            ace_type: AceType::Allow,
            sid,
            access_mask,
            flags: INHERIT_TO_CHILDREN,
        }
    }

    pub fn deny(sid: Sid, access_mask: u32) -> Self {
        Self {
            ace_type: AceType::Deny,
            sid,
            access_mask,
            flags: INHERIT_TO_CHILDREN,
        }
    }

    /// Full-control allow entry inherited by subkeys
    pub fn full_control(sid: Sid) -> Self {
        Self::allow(sid, KEY_ALL_ACCESS)
    }
}

/// Owner plus discretionary ACL of a key
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    pub owner: Option<Sid>,
    pub dacl: Vec<Ace>,
}

impl SecurityDescriptor {
    /// Descriptor owned by `user`, granting full control to the user,
    /// Administrators and SYSTEM.
    pub fn full_control(user: &Sid) -> Self {
        Self {
            owner: Some(user.clone()),
            dacl: Self::takeover_entries(user),
        }
    }

    /// The three entries prepended during a takeover, in order
    pub fn takeover_entries(user: &Sid) -> Vec<Ace> {
        vec![
            Ace::full_control(user.clone()),
            Ace::full_control(Sid::administrators()),
            Ace::full_control(Sid::local_system()),
        ]
    }

    /// Rewrite this descriptor for ownership takeover.
    ///
    /// The owner becomes `user`; the takeover entries are placed ahead of the
    /// existing entries, and existing exact copies of them are dropped so
    /// repeated takeovers do not grow the ACL.
    pub fn taken_over_by(&self, user: &Sid) -> Self {
        let mut dacl = Self::takeover_entries(user);
        let existing: Vec<Ace> = self
            .dacl
            .iter()
            .filter(|ace| !dacl.contains(ace))
            .cloned()
            .collect();
        dacl.extend(existing);
        Self {
            owner: Some(user.clone()),
            dacl,
        }
    }

    /// Evaluate the DACL in order for any of `principals`.
    ///
    /// The first entry that names one of the principals and covers any bit of
    /// `access` decides; no matching entry means denied.
    pub fn allows(&self, principals: &[Sid], access: u32) -> bool {
        for ace in &self.dacl {
            if !principals.contains(&ace.sid) || ace.access_mask & access == 0 {
                continue;
            }
            return match ace.ace_type {
                AceType::Deny => false,
                AceType::Allow => ace.access_mask & access == access,
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Sid {
        Sid::new("S-1-5-21-1000")
    }

    #[test]
    fn test_full_control_descriptor() {
        let sd = SecurityDescriptor::full_control(&user());
        assert_eq!(sd.owner, Some(user()));
        assert_eq!(sd.dacl.len(), 3);
        assert_eq!(sd.dacl[1].sid.as_str(), Sid::ADMINISTRATORS);
        assert_eq!(sd.dacl[2].sid.as_str(), Sid::LOCAL_SYSTEM);
        assert!(sd.allows(&[user()], KEY_SET_VALUE));
    }

    #[test]
    fn test_takeover_prepends_entries() {
        let original = SecurityDescriptor {
            owner: Some(Sid::new("S-1-5-80-956008885")),
            dacl: vec![Ace::deny(user(), KEY_SET_VALUE)],
        };
        assert!(!original.allows(&[user()], KEY_SET_VALUE));

        let taken = original.taken_over_by(&user());
        assert_eq!(taken.owner, Some(user()));
        assert_eq!(taken.dacl.len(), 4);
        assert_eq!(taken.dacl[3], Ace::deny(user(), KEY_SET_VALUE));
        assert!(taken.allows(&[user()], KEY_SET_VALUE));
    }

    #[test]
    fn test_takeover_is_idempotent_in_size() {
        let once = SecurityDescriptor::default().taken_over_by(&user());
        let twice = once.taken_over_by(&user());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_allows_first_match_wins() {
        let sd = SecurityDescriptor {
            owner: None,
            dacl: vec![
                Ace::allow(user(), KEY_QUERY_VALUE),
                Ace::deny(user(), KEY_ALL_ACCESS),
            ],
        };
        assert!(sd.allows(&[user()], KEY_QUERY_VALUE));
        assert!(!sd.allows(&[user()], KEY_SET_VALUE));
        assert!(!sd.allows(&[Sid::local_system()], KEY_QUERY_VALUE));
    }
}
