use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShopId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Advisor,
    Tech,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Advisor => "ADVISOR",
            Role::Tech => "TECH",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OWNER" => Ok(Role::Owner),
            "ADVISOR" => Ok(Role::Advisor),
            "TECH" => Ok(Role::Tech),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Verified identity supplied by the upstream session provider.
///
/// The engine never authenticates; it only authorizes against this value.
/// Every tenant-scoped operation takes a `Principal` explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub shop_id: ShopId,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role, shop_id: impl Into<String>) -> Self {
        Self { id: UserId(id.into()), role, shop_id: ShopId(shop_id.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_parses_wire_names() {
        assert_eq!("OWNER".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("ADVISOR".parse::<Role>(), Ok(Role::Advisor));
        assert_eq!("TECH".parse::<Role>(), Ok(Role::Tech));
        assert!("MANAGER".parse::<Role>().is_err());
    }
}
