// src/models/account.rs
//! Демонстрационный ресурс `accounts`: модель, сериализатор и настройки таблицы

use crate::models::meta::{FieldDef, FieldKind, ManyToManyRelation, ModelMeta, Relation};
use crate::serializer::SerializerFields;
use crate::view::{ModelView, ViewConfig};

pub const ACCOUNTS_RESOURCE: &str = "accounts";

pub fn account_meta() -> ModelMeta {
    ModelMeta::new("accounts")
        .field(FieldDef::new("id", "ID", FieldKind::Auto))
        .field(FieldDef::new("uuid", "UUID", FieldKind::Uuid))
        .field(FieldDef::new("username", "用户名", FieldKind::Char))
        .field(FieldDef::new("email", "邮箱", FieldKind::Email))
        .field(FieldDef::new("password", "password", FieldKind::Char))
        .field(FieldDef::new("region", "地区", FieldKind::Char))
        .field(FieldDef::new("score", "积分", FieldKind::Integer))
        .field(FieldDef::new("balance", "余额", FieldKind::Float))
        .field(FieldDef::new("is_active", "是否启用", FieldKind::Boolean))
        .field(FieldDef::new("bio", "简介", FieldKind::Text))
        .field(FieldDef::new("created_at", "创建时间", FieldKind::DateTime))
        .field(
            FieldDef::new(
                "department",
                "部门",
                FieldKind::ForeignKey(Relation::new("departments", "id", "name")),
            )
            .with_column("department_id"),
        )
        .field(FieldDef::new(
            "roles",
            "角色",
            FieldKind::ManyToMany(ManyToManyRelation::new(
                "account_roles",
                "account_id",
                "role_id",
                Relation::new("roles", "id", "name"),
            )),
        ))
}

pub fn account_serializer() -> SerializerFields {
    SerializerFields::from_meta(&account_meta())
        .read_only(&["id", "uuid", "created_at"])
        .write_only(&["password"])
}

pub fn account_view_config() -> ViewConfig {
    ViewConfig::default()
        .with_select_fields(&["region"])
        .with_sorter_fields(&["id", "score", "balance", "created_at"])
        .with_copyable_fields(&["uuid", "email"])
        .with_not_search_fields(&["bio"])
        .with_hidden_fields(&["uuid"])
        .with_render_region_fields(&["region"])
        .with_render_compare_fields(&["score"])
        .with_global_search_fields(&["username", "email", "bio"])
}

/// Ресурс `accounts`; секция `[views.accounts]` из конфигурации заменяет настройки по умолчанию
pub fn account_resource(view_override: Option<&ViewConfig>) -> Result<ModelView, String> {
    let view = view_override.cloned().unwrap_or_else(account_view_config);
    ModelView::new(ACCOUNTS_RESOURCE, account_meta(), account_serializer(), view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_meta_is_valid() {
        assert!(account_meta().validate().is_ok());
    }

    #[test]
    fn test_account_serializer_flags() {
        let serializer = account_serializer();
        assert!(serializer.get("id").map(|f| f.read_only).unwrap_or(false));
        assert!(serializer.get("password").map(|f| f.write_only).unwrap_or(false));
        assert!(serializer.get("username").is_some());
    }

    #[test]
    fn test_account_resource_view_override() {
        use crate::view::ProTableResource;

        let default = account_resource(None).unwrap();
        assert_eq!(default.view_config().select_fields, vec!["region"]);

        let custom = ViewConfig::default().with_export_filename("Accounts");
        let overridden = account_resource(Some(&custom)).unwrap();
        assert_eq!(overridden.view_config().export_filename, "Accounts");
        assert!(overridden.view_config().select_fields.is_empty());
    }
}
