use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "code_gen_record")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub table_name: String,
    pub table_comment: String,
    pub package_name: String,
    pub module_name: String,
    /// JSON text: the generation config as last saved
    pub config: String,
    /// JSON text: column snapshot frozen at the last save
    pub snapshot: String,
    /// "pending" | "generated"
    pub status: String,
    /// Bumped on every write; guards against interleaved updates.
    pub version: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
