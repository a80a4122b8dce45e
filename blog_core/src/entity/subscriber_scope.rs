use crate::ids::SubscriberId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[sea_orm(string_value = "author")]
    Author,
    #[sea_orm(string_value = "category")]
    Category,
    #[sea_orm(string_value = "tag")]
    Tag,
}

/// Narrows a subscription to one author, category or tag. `target_id` holds
/// the raw uuid of the referenced row; uuids are unique across tables, so it
/// identifies the scope together with the subscriber.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriber_scope")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub subscriber_id: SubscriberId,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_id: Uuid,
    pub kind: ScopeKind,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscriber::Entity",
        from = "Column::SubscriberId",
        to = "super::subscriber::Column::Id"
    )]
    Subscriber,
}

impl Related<super::subscriber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriber.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
