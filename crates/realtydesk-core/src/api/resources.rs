/// Versioned prefix shared by every endpoint
pub const API_PREFIX: &str = "/api/v1";

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REGISTER_PATH: &str = "/api/v1/auth/register";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh-token";

/// CRM resource collections served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Properties,
    Leads,
    Deals,
    Contracts,
    Developments,
    Lots,
    Commissions,
    Users,
    Organizations,
    Shifts,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Properties,
        Resource::Leads,
        Resource::Deals,
        Resource::Contracts,
        Resource::Developments,
        Resource::Lots,
        Resource::Commissions,
        Resource::Users,
        Resource::Organizations,
        Resource::Shifts,
        Resource::Reports,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Properties => "properties",
            Resource::Leads => "leads",
            Resource::Deals => "deals",
            Resource::Contracts => "contracts",
            Resource::Developments => "developments",
            Resource::Lots => "lots",
            Resource::Commissions => "commissions",
            Resource::Users => "users",
            Resource::Organizations => "organizations",
            Resource::Shifts => "shifts",
            Resource::Reports => "reports",
        }
    }

    /// Collection path, e.g. `/api/v1/leads`
    pub fn path(&self) -> String {
        format!("{}/{}", API_PREFIX, self.name())
    }

    /// Single item path, e.g. `/api/v1/leads/42`
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path(), id)
    }

    /// Parse a resource by its collection name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
