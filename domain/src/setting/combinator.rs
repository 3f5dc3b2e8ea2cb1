//! Linked-settings combination rules
//!
//! Derives one [`Status`] for a [`LinkedConfigurationGroup`] from the
//! statuses of its items.

use super::entities::{CombinationPolicy, LinkedConfigurationGroup};
use super::status::Status;

/// Combine per-item statuses for a group.
///
/// `statuses` must be in item order. A length mismatch yields
/// [`Status::Unknown`].
///
/// ```
/// use regpilot_domain::registry::{ConfigPath, Hive, KeyPath};
/// use regpilot_domain::setting::{
///     combine, CombinationPolicy, ConfigurationItem, LinkedConfigurationGroup, Status,
/// };
///
/// let item = |n: &str| {
///     ConfigurationItem::new(n, ConfigPath::new(KeyPath::new(Hive::CurrentUser, "Software\\X"), n))
/// };
/// let group = LinkedConfigurationGroup::new("g", vec![item("a"), item("b")], CombinationPolicy::All).unwrap();
/// assert_eq!(combine(&group, &[Status::Applied, Status::NotApplied]), Status::Modified);
/// ```
pub fn combine(group: &LinkedConfigurationGroup, statuses: &[Status]) -> Status {
    if statuses.len() != group.items.len() {
        return Status::Unknown;
    }
    let policy = match group.policy {
        CombinationPolicy::Custom if group.mixes_user_and_machine() => CombinationPolicy::Any,
        CombinationPolicy::Custom => CombinationPolicy::All,
        other => other,
    };
    combine_statuses(policy, statuses, group.primary_index())
}

/// Combine statuses under an already-resolved policy.
///
/// `Error` wins over everything, then `Unknown`. `Custom` is treated as
/// `All` here; resolving the mixed-hive rule needs the group.
pub fn combine_statuses(policy: CombinationPolicy, statuses: &[Status], primary: usize) -> Status {
    if statuses.is_empty() {
        return Status::Unknown;
    }
    if statuses.contains(&Status::Error) {
        return Status::Error;
    }
    if statuses.contains(&Status::Unknown) {
        return Status::Unknown;
    }

    let all = |s: Status| statuses.iter().all(|x| *x == s);

    match policy {
        CombinationPolicy::Primary => statuses.get(primary).copied().unwrap_or(statuses[0]),
        CombinationPolicy::Any if statuses.contains(&Status::Applied) => Status::Applied,
        CombinationPolicy::All | CombinationPolicy::Custom if all(Status::Applied) => Status::Applied,
        _ if all(Status::NotApplied) => Status::NotApplied,
        _ => Status::Modified,
    }
}
