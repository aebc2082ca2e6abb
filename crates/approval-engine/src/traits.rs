//! Collaborator seams: organization directory and contract store
//!
//! The engine never owns organizational or contract data. It reads both
//! through these traits as synchronous lookups; failures surface as
//! errors instead of being retried or held behind an instance lock.
//!
//! `InMemoryDirectory` and `InMemoryContracts` are reference
//! implementations, deterministic by registration order — used by the
//! engine's own tests and handy as test doubles for consumers.

use approval_types::{
    ContractId, ContractStoreError, ContractSummary, DeptId, DirectoryError, RoleId, UserId,
};
use std::collections::{HashMap, HashSet};

// ── Traits ───────────────────────────────────────────────────────────

/// Read-only view of the organizational hierarchy
pub trait OrgDirectory {
    /// The user's reporting chain, nearest manager first. Excludes the
    /// user themself.
    fn reporting_chain(&self, user: &UserId) -> Result<Vec<UserId>, DirectoryError>;

    /// Users holding `role`, optionally scoped to a department
    fn users_with_role(
        &self,
        role: &RoleId,
        department: Option<&DeptId>,
    ) -> Result<Vec<UserId>, DirectoryError>;

    fn department_of(&self, user: &UserId) -> Result<DeptId, DirectoryError>;

    fn user_has_role(&self, user: &UserId, role: &RoleId) -> Result<bool, DirectoryError>;

    /// The user's organization level, when the directory models one
    fn org_level_of(&self, user: &UserId) -> Result<Option<u32>, DirectoryError>;
}

/// Read-only view of the contract store
pub trait ContractStore {
    fn contract_summary(&self, contract: &ContractId)
        -> Result<ContractSummary, ContractStoreError>;

    fn is_eligible_for_approval(
        &self,
        contract: &ContractId,
    ) -> Result<bool, ContractStoreError>;
}

// ── In-memory directory ──────────────────────────────────────────────

/// Deterministic in-memory `OrgDirectory`
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    /// Registration order, so role queries are deterministic
    users: Vec<UserId>,
    managers: HashMap<UserId, UserId>,
    departments: HashMap<UserId, DeptId>,
    roles: HashMap<UserId, HashSet<RoleId>>,
    org_levels: HashMap<UserId, u32>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in a department; idempotent on the user id
    pub fn add_user(&mut self, user: UserId, department: DeptId) -> &mut Self {
        if !self.users.contains(&user) {
            self.users.push(user.clone());
        }
        self.departments.insert(user, department);
        self
    }

    pub fn set_manager(&mut self, user: UserId, manager: UserId) -> &mut Self {
        self.managers.insert(user, manager);
        self
    }

    pub fn grant_role(&mut self, user: UserId, role: RoleId) -> &mut Self {
        self.roles.entry(user).or_default().insert(role);
        self
    }

    pub fn set_org_level(&mut self, user: UserId, level: u32) -> &mut Self {
        self.org_levels.insert(user, level);
        self
    }
}

impl OrgDirectory for InMemoryDirectory {
    fn reporting_chain(&self, user: &UserId) -> Result<Vec<UserId>, DirectoryError> {
        if !self.departments.contains_key(user) {
            return Err(DirectoryError::UserNotFound(user.clone()));
        }
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = user;
        while let Some(manager) = self.managers.get(current) {
            // malformed data can loop; return what was walked so far
            if !seen.insert(manager.clone()) {
                break;
            }
            chain.push(manager.clone());
            current = manager;
        }
        Ok(chain)
    }

    fn users_with_role(
        &self,
        role: &RoleId,
        department: Option<&DeptId>,
    ) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|user| {
                self.roles
                    .get(user)
                    .map(|roles| roles.contains(role))
                    .unwrap_or(false)
            })
            .filter(|user| match department {
                Some(dept) => self.departments.get(user) == Some(dept),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn department_of(&self, user: &UserId) -> Result<DeptId, DirectoryError> {
        self.departments
            .get(user)
            .cloned()
            .ok_or_else(|| DirectoryError::UserNotFound(user.clone()))
    }

    fn user_has_role(&self, user: &UserId, role: &RoleId) -> Result<bool, DirectoryError> {
        Ok(self
            .roles
            .get(user)
            .map(|roles| roles.contains(role))
            .unwrap_or(false))
    }

    fn org_level_of(&self, user: &UserId) -> Result<Option<u32>, DirectoryError> {
        Ok(self.org_levels.get(user).copied())
    }
}

// ── In-memory contract store ─────────────────────────────────────────

/// In-memory `ContractStore`
#[derive(Clone, Debug, Default)]
pub struct InMemoryContracts {
    contracts: HashMap<ContractId, ContractSummary>,
    ineligible: HashSet<ContractId>,
}

impl InMemoryContracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract(&mut self, id: ContractId, summary: ContractSummary) -> &mut Self {
        self.contracts.insert(id, summary);
        self
    }

    /// Mark a contract as failing the eligibility pre-check
    pub fn set_ineligible(&mut self, id: ContractId) -> &mut Self {
        self.ineligible.insert(id);
        self
    }
}

impl ContractStore for InMemoryContracts {
    fn contract_summary(
        &self,
        contract: &ContractId,
    ) -> Result<ContractSummary, ContractStoreError> {
        self.contracts
            .get(contract)
            .cloned()
            .ok_or_else(|| ContractStoreError::NotFound(contract.clone()))
    }

    fn is_eligible_for_approval(
        &self,
        contract: &ContractId,
    ) -> Result<bool, ContractStoreError> {
        if !self.contracts.contains_key(contract) {
            return Err(ContractStoreError::NotFound(contract.clone()));
        }
        Ok(!self.ineligible.contains(contract))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporting_chain_order() {
        let mut directory = InMemoryDirectory::new();
        directory
            .add_user(UserId::new("worker"), DeptId::new("d-1"))
            .add_user(UserId::new("lead"), DeptId::new("d-1"))
            .add_user(UserId::new("director"), DeptId::new("d-0"))
            .set_manager(UserId::new("worker"), UserId::new("lead"))
            .set_manager(UserId::new("lead"), UserId::new("director"));

        let chain = directory.reporting_chain(&UserId::new("worker")).unwrap();
        assert_eq!(chain, vec![UserId::new("lead"), UserId::new("director")]);
    }

    #[test]
    fn test_reporting_chain_tolerates_cycle() {
        let mut directory = InMemoryDirectory::new();
        directory
            .add_user(UserId::new("a"), DeptId::new("d"))
            .add_user(UserId::new("b"), DeptId::new("d"))
            .set_manager(UserId::new("a"), UserId::new("b"))
            .set_manager(UserId::new("b"), UserId::new("a"));

        let chain = directory.reporting_chain(&UserId::new("a")).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_role_queries_scoped_and_global() {
        let mut directory = InMemoryDirectory::new();
        directory
            .add_user(UserId::new("u-1"), DeptId::new("d-1"))
            .add_user(UserId::new("u-2"), DeptId::new("d-2"))
            .grant_role(UserId::new("u-1"), RoleId::new("LEGAL"))
            .grant_role(UserId::new("u-2"), RoleId::new("LEGAL"));

        let global = directory
            .users_with_role(&RoleId::new("LEGAL"), None)
            .unwrap();
        assert_eq!(global.len(), 2);

        let scoped = directory
            .users_with_role(&RoleId::new("LEGAL"), Some(&DeptId::new("d-2")))
            .unwrap();
        assert_eq!(scoped, vec![UserId::new("u-2")]);
    }

    #[test]
    fn test_unknown_user() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(
            directory.reporting_chain(&UserId::new("ghost")),
            Err(DirectoryError::UserNotFound(_))
        ));
        assert!(matches!(
            directory.department_of(&UserId::new("ghost")),
            Err(DirectoryError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_contract_store() {
        let mut contracts = InMemoryContracts::new();
        contracts.add_contract(
            ContractId::new("c-1"),
            ContractSummary::new("MAINTENANCE_SERVICE", 1_000.0),
        );
        contracts.set_ineligible(ContractId::new("c-1"));

        assert!(!contracts
            .is_eligible_for_approval(&ContractId::new("c-1"))
            .unwrap());
        assert!(matches!(
            contracts.contract_summary(&ContractId::new("ghost")),
            Err(ContractStoreError::NotFound(_))
        ));
    }
}
