use super::store::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Superuser,
    Mentor,
    Jobseeker,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Superuser, Permission::Mentor, Permission::Jobseeker];

    pub fn name(self) -> &'static str {
        match self {
            Permission::Superuser => "superuser",
            Permission::Mentor => "mentor",
            Permission::Jobseeker => "jobseeker",
        }
    }

    /// Superusers hold every permission.
    pub fn allows(self, account: &Account) -> bool {
        account.is_superuser
            || match self {
                Permission::Superuser => false,
                Permission::Mentor => account.is_mentor,
                Permission::Jobseeker => account.is_jobseeker,
            }
    }

    pub fn granted(account: &Account) -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .filter(|p| p.allows(account))
            .map(Permission::name)
            .collect()
    }
}
