use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum FinancingRecords {
    Table,
    Id,
    FarmerId,
    AmountMinor,
    TermMonths,
    Purpose,
    Status,
    AnnualRatePercent,
    ReviewerId,
    ReviewedAt,
    ReviewNote,
    CreditScore,
    DisbursedAt,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinancingRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinancingRecords::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FinancingRecords::FarmerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinancingRecords::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinancingRecords::TermMonths)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FinancingRecords::Purpose).string())
                    .col(ColumnDef::new(FinancingRecords::Status).string().not_null())
                    .col(ColumnDef::new(FinancingRecords::AnnualRatePercent).double())
                    .col(ColumnDef::new(FinancingRecords::ReviewerId).string())
                    .col(ColumnDef::new(FinancingRecords::ReviewedAt).timestamp())
                    .col(ColumnDef::new(FinancingRecords::ReviewNote).string())
                    .col(ColumnDef::new(FinancingRecords::CreditScore).integer())
                    .col(ColumnDef::new(FinancingRecords::DisbursedAt).timestamp())
                    .col(
                        ColumnDef::new(FinancingRecords::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinancingRecords::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinancingRecords::Version)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-financing_records-farmer_id")
                    .table(FinancingRecords::Table)
                    .col(FinancingRecords::FarmerId)
                    .to_owned(),
            )
            .await?;

        // The review queue scans by status ordered by submission time.
        manager
            .create_index(
                Index::create()
                    .name("idx-financing_records-status-created_at")
                    .table(FinancingRecords::Table)
                    .col(FinancingRecords::Status)
                    .col(FinancingRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FinancingRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}
