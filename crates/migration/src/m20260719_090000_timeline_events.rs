use sea_orm_migration::prelude::*;

use crate::m20260712_090000_financing_records::FinancingRecords;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum TimelineEvents {
    Table,
    Id,
    FinancingId,
    At,
    Actor,
    Action,
    Note,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimelineEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimelineEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TimelineEvents::FinancingId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TimelineEvents::At).timestamp().not_null())
                    .col(ColumnDef::new(TimelineEvents::Actor).string().not_null())
                    .col(ColumnDef::new(TimelineEvents::Action).string().not_null())
                    .col(ColumnDef::new(TimelineEvents::Note).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-timeline_events-financing_id")
                            .from(TimelineEvents::Table, TimelineEvents::FinancingId)
                            .to(FinancingRecords::Table, FinancingRecords::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-timeline_events-financing_id-at")
                    .table(TimelineEvents::Table)
                    .col(TimelineEvents::FinancingId)
                    .col(TimelineEvents::At)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimelineEvents::Table).to_owned())
            .await?;
        Ok(())
    }
}
