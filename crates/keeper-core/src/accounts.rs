//! Owner and group name lookup

use std::collections::HashMap;

use nix::unistd::{Group, User};

/// Name of the account every unresolvable owner or group falls back to.
pub const FALLBACK_ACCOUNT: &str = "root";

/// Resolves user and group names to numeric ids.
pub trait AccountDb {
    /// Numeric id of user `name`, if it exists.
    fn user_id(&self, name: &str) -> Option<u32>;

    /// Numeric id of group `name`, if it exists.
    fn group_id(&self, name: &str) -> Option<u32>;
}

/// The host's user and group databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

impl AccountDb for SystemAccounts {
    fn user_id(&self, name: &str) -> Option<u32> {
        User::from_name(name).ok().flatten().map(|u| u.uid.as_raw())
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        Group::from_name(name).ok().flatten().map(|g| g.gid.as_raw())
    }
}

/// A fixed in-memory account table.
///
/// Useful for running the engine unprivileged: map `root` to the current
/// uid/gid and every ownership change becomes a no-op the kernel allows.
#[derive(Debug, Default, Clone)]
pub struct AccountTable {
    users: HashMap<String, u32>,
    groups: HashMap<String, u32>,
}

impl AccountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: impl Into<String>, uid: u32) -> Self {
        self.users.insert(name.into(), uid);
        self
    }

    pub fn with_group(mut self, name: impl Into<String>, gid: u32) -> Self {
        self.groups.insert(name.into(), gid);
        self
    }
}

impl AccountDb for AccountTable {
    fn user_id(&self, name: &str) -> Option<u32> {
        self.users.get(name).copied()
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        self.groups.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_accounts_know_root() {
        assert_eq!(SystemAccounts.user_id("root"), Some(0));
        assert_eq!(SystemAccounts.group_id("root"), Some(0));
    }

    #[test]
    fn system_accounts_miss_unknown_names() {
        assert_eq!(SystemAccounts.user_id("no-such-user-keeper-test"), None);
    }

    #[test]
    fn table_lookups() {
        let table = AccountTable::new().with_user("svc", 990).with_group("svc", 991);
        assert_eq!(table.user_id("svc"), Some(990));
        assert_eq!(table.group_id("svc"), Some(991));
        assert_eq!(table.user_id("root"), None);
    }
}
