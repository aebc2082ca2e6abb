//! Approver resolver: turns a node's approver spec into concrete users
//!
//! Resolution is pure and deterministic for a fixed organizational
//! snapshot: results follow directory order, deduplicated preserving
//! first occurrence. The resolver never retries; the caller may
//! re-resolve after an org-data refresh.

use crate::compiler::ApproverSpec;
use crate::traits::OrgDirectory;
use approval_types::{ResolveError, UserId};
use std::collections::HashSet;

/// Upper bound on reporting-chain walks. Malformed org data can contain
/// cycles; the walk must fail fast instead of looping.
pub const MAX_REPORT_HOPS: usize = 32;

/// Resolves "who must approve next" against the organization directory
#[derive(Clone, Debug, Default)]
pub struct ApproverResolver;

impl ApproverResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the set of users who must act for `spec`, given the
    /// instance initiator's position in the hierarchy.
    pub fn resolve<D: OrgDirectory>(
        &self,
        directory: &D,
        spec: &ApproverSpec,
        initiator: &UserId,
    ) -> Result<Vec<UserId>, ResolveError> {
        match spec {
            ApproverSpec::ChainHops { hops } => {
                let chain = directory.reporting_chain(initiator)?;
                let hops = *hops as usize;
                if hops > MAX_REPORT_HOPS {
                    return Err(ResolveError::NoApprover(format!(
                        "requested {} hops exceeds the {}-hop walk limit",
                        hops, MAX_REPORT_HOPS
                    )));
                }
                match chain.get(hops - 1) {
                    Some(user) => Ok(vec![user.clone()]),
                    None => Err(ResolveError::NoApprover(format!(
                        "reporting chain of '{}' has only {} member(s), needed {}",
                        initiator,
                        chain.len(),
                        hops
                    ))),
                }
            }

            ApproverSpec::ChainRole { role } => {
                let chain = directory.reporting_chain(initiator)?;
                for user in chain.iter().take(MAX_REPORT_HOPS) {
                    if directory.user_has_role(user, role)? {
                        return Ok(vec![user.clone()]);
                    }
                }
                Err(ResolveError::NoApprover(format!(
                    "no ancestor of '{}' holds role '{}' within {} hops",
                    initiator, role, MAX_REPORT_HOPS
                )))
            }

            ApproverSpec::DepartmentRole { role } => {
                let department = directory.department_of(initiator)?;
                let users = directory.users_with_role(role, Some(&department))?;
                let users = dedup(users);
                if users.is_empty() {
                    tracing::warn!(
                        role = %role,
                        department = %department,
                        "no department-scoped approver candidates"
                    );
                    return Err(ResolveError::NoApprover(format!(
                        "no user holds role '{}' in department '{}'",
                        role, department
                    )));
                }
                Ok(users)
            }

            ApproverSpec::GlobalRole { role } => {
                let users = dedup(directory.users_with_role(role, None)?);
                if users.is_empty() {
                    return Err(ResolveError::NoApprover(format!(
                        "no user holds role '{}' anywhere",
                        role
                    )));
                }
                Ok(users)
            }
        }
    }
}

/// Deduplicate preserving first occurrence
fn dedup(users: Vec<UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    users.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::InMemoryDirectory;
    use approval_types::{DeptId, RoleId};

    fn directory() -> InMemoryDirectory {
        let mut d = InMemoryDirectory::new();
        d.add_user(UserId::new("worker"), DeptId::new("county"))
            .add_user(UserId::new("lead"), DeptId::new("county"))
            .add_user(UserId::new("city-mgr"), DeptId::new("city"))
            .add_user(UserId::new("prov-mgr"), DeptId::new("province"))
            .set_manager(UserId::new("worker"), UserId::new("lead"))
            .set_manager(UserId::new("lead"), UserId::new("city-mgr"))
            .set_manager(UserId::new("city-mgr"), UserId::new("prov-mgr"))
            .grant_role(UserId::new("city-mgr"), RoleId::new("CITY_MANAGER"))
            .grant_role(UserId::new("prov-mgr"), RoleId::new("PROVINCE_MANAGER"));
        d
    }

    #[test]
    fn test_chain_hops() {
        let directory = directory();
        let resolver = ApproverResolver::new();

        let one = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainHops { hops: 1 },
                &UserId::new("worker"),
            )
            .unwrap();
        assert_eq!(one, vec![UserId::new("lead")]);

        let three = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainHops { hops: 3 },
                &UserId::new("worker"),
            )
            .unwrap();
        assert_eq!(three, vec![UserId::new("prov-mgr")]);
    }

    #[test]
    fn test_chain_exhausted() {
        let directory = directory();
        let resolver = ApproverResolver::new();
        let err = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainHops { hops: 9 },
                &UserId::new("worker"),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoApprover(_)));
    }

    #[test]
    fn test_chain_role() {
        let directory = directory();
        let resolver = ApproverResolver::new();
        let found = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainRole {
                    role: RoleId::new("CITY_MANAGER"),
                },
                &UserId::new("worker"),
            )
            .unwrap();
        assert_eq!(found, vec![UserId::new("city-mgr")]);

        let err = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainRole {
                    role: RoleId::new("CFO"),
                },
                &UserId::new("worker"),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoApprover(_)));
    }

    #[test]
    fn test_chain_role_bounded_on_cyclic_data() {
        let mut directory = InMemoryDirectory::new();
        directory
            .add_user(UserId::new("a"), DeptId::new("d"))
            .add_user(UserId::new("b"), DeptId::new("d"))
            .set_manager(UserId::new("a"), UserId::new("b"))
            .set_manager(UserId::new("b"), UserId::new("a"));

        let resolver = ApproverResolver::new();
        let err = resolver
            .resolve(
                &directory,
                &ApproverSpec::ChainRole {
                    role: RoleId::new("CFO"),
                },
                &UserId::new("a"),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoApprover(_)));
    }

    #[test]
    fn test_department_role_scoped_to_initiator() {
        let mut directory = directory();
        directory
            .add_user(UserId::new("county-legal"), DeptId::new("county"))
            .add_user(UserId::new("city-legal"), DeptId::new("city"))
            .grant_role(UserId::new("county-legal"), RoleId::new("LEGAL"))
            .grant_role(UserId::new("city-legal"), RoleId::new("LEGAL"));

        let resolver = ApproverResolver::new();
        let found = resolver
            .resolve(
                &directory,
                &ApproverSpec::DepartmentRole {
                    role: RoleId::new("LEGAL"),
                },
                &UserId::new("worker"),
            )
            .unwrap();
        // only the initiator's own department qualifies
        assert_eq!(found, vec![UserId::new("county-legal")]);
    }

    #[test]
    fn test_department_role_empty_is_no_approver() {
        let directory = directory();
        let resolver = ApproverResolver::new();
        let err = resolver
            .resolve(
                &directory,
                &ApproverSpec::DepartmentRole {
                    role: RoleId::new("LEGAL"),
                },
                &UserId::new("worker"),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoApprover(_)));
    }

    #[test]
    fn test_global_role_unscoped() {
        let mut directory = directory();
        directory
            .add_user(UserId::new("legal-1"), DeptId::new("city"))
            .add_user(UserId::new("legal-2"), DeptId::new("province"))
            .grant_role(UserId::new("legal-1"), RoleId::new("LEGAL"))
            .grant_role(UserId::new("legal-2"), RoleId::new("LEGAL"));

        let resolver = ApproverResolver::new();
        let found = resolver
            .resolve(
                &directory,
                &ApproverSpec::GlobalRole {
                    role: RoleId::new("LEGAL"),
                },
                &UserId::new("worker"),
            )
            .unwrap();
        assert_eq!(found.len(), 2);
        // directory registration order is preserved
        assert_eq!(found[0], UserId::new("legal-1"));
    }
}
