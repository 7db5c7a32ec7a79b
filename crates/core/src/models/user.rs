use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    TenantOwner,
    TenantStaff,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::TenantOwner => "tenant_owner",
            UserRole::TenantStaff => "tenant_staff",
            UserRole::Customer => "customer",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(UserRole::SuperAdmin),
            "tenant_owner" => Ok(UserRole::TenantOwner),
            "tenant_staff" => Ok(UserRole::TenantStaff),
            "customer" => Ok(UserRole::Customer),
            _ => Err(format!("无效的用户角色: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for UserRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for UserRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// 用户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub tenant_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 是否具备管理指定租户的权限（店主/店员限本租户，超管不限）
    pub fn can_manage_tenant(&self, tenant_id: i64) -> bool {
        match self.role {
            UserRole::SuperAdmin => true,
            UserRole::TenantOwner | UserRole::TenantStaff => self.tenant_id == Some(tenant_id),
            UserRole::Customer => false,
        }
    }
}

/// 新建用户
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub tenant_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole, tenant_id: Option<i64>) -> User {
        User {
            id: 1,
            email: "u@example.com".to_string(),
            username: None,
            full_name: None,
            phone: None,
            role,
            is_active: true,
            tenant_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tenant_owner_manages_own_tenant_only() {
        let owner = user(UserRole::TenantOwner, Some(7));
        assert!(owner.can_manage_tenant(7));
        assert!(!owner.can_manage_tenant(8));
    }

    #[test]
    fn test_super_admin_manages_any_tenant() {
        assert!(user(UserRole::SuperAdmin, None).can_manage_tenant(42));
    }

    #[test]
    fn test_customer_manages_nothing() {
        assert!(!user(UserRole::Customer, Some(7)).can_manage_tenant(7));
    }
}
