use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CodeGenRecord::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CodeGenRecord::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CodeGenRecord::TableName).string().not_null())
                    .col(
                        ColumnDef::new(CodeGenRecord::TableComment)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::PackageName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::ModuleName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::Config)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::Snapshot)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CodeGenRecord::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_code_gen_record_table_name")
                    .table(CodeGenRecord::Table)
                    .col(CodeGenRecord::TableName)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CodeGenRecord::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CodeGenRecord {
    Table,
    Id,
    TableName,
    TableComment,
    PackageName,
    ModuleName,
    Config,
    Snapshot,
    Status,
    Version,
    CreatedAt,
    UpdatedAt,
}
