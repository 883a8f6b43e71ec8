use sea_orm_migration::prelude::*;

use crate::m20260712_090000_financing_records::FinancingRecords;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Installments {
    Table,
    Id,
    FinancingId,
    Seq,
    DueDate,
    PrincipalMinor,
    InterestMinor,
    Status,
    PaidAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Installments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Installments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Installments::FinancingId).string().not_null())
                    .col(ColumnDef::new(Installments::Seq).integer().not_null())
                    .col(ColumnDef::new(Installments::DueDate).timestamp().not_null())
                    .col(
                        ColumnDef::new(Installments::PrincipalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Installments::InterestMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Installments::Status).string().not_null())
                    .col(ColumnDef::new(Installments::PaidAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-installments-financing_id")
                            .from(Installments::Table, Installments::FinancingId)
                            .to(FinancingRecords::Table, FinancingRecords::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-installments-financing_id-seq")
                    .table(Installments::Table)
                    .col(Installments::FinancingId)
                    .col(Installments::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The overdue sweep filters open installments by due date.
        manager
            .create_index(
                Index::create()
                    .name("idx-installments-status-due_date")
                    .table(Installments::Table)
                    .col(Installments::Status)
                    .col(Installments::DueDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Installments::Table).to_owned())
            .await?;
        Ok(())
    }
}
