use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_customers_table::Migration),
            Box::new(m20240301_000002_create_items_table::Migration),
            Box::new(m20240301_000003_create_fleets_table::Migration),
            Box::new(m20240301_000004_create_delivery_orders_table::Migration),
            Box::new(m20240301_000005_create_delivery_order_lines_table::Migration),
            Box::new(m20240301_000006_create_shipments_table::Migration),
            Box::new(m20240301_000007_create_allocations_table::Migration),
            Box::new(m20240301_000008_create_audit_logs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_customers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Initials).string().not_null())
                        .col(ColumnDef::new(Customers::Address).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Customers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Customers::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_customers_name")
                        .table(Customers::Table)
                        .col(Customers::Name)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Customers {
        Table,
        Id,
        Name,
        Initials,
        Address,
        Phone,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(
                            ColumnDef::new(Items::StockKeepingUnit)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Items::Description).string().null())
                        .col(ColumnDef::new(Items::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Items::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Items::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_items_name")
                        .table(Items::Table)
                        .col(Items::Name)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Items {
        Table,
        Id,
        Name,
        StockKeepingUnit,
        Description,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_fleets_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_fleets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Fleets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Fleets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Fleets::LicensePlate).string().not_null())
                        .col(ColumnDef::new(Fleets::VehicleType).string().null())
                        .col(ColumnDef::new(Fleets::Description).string().null())
                        .col(ColumnDef::new(Fleets::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Fleets::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Fleets::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_fleets_license_plate")
                        .table(Fleets::Table)
                        .col(Fleets::LicensePlate)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Fleets::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Fleets {
        Table,
        Id,
        LicensePlate,
        VehicleType,
        Description,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_delivery_orders_table {

    use sea_orm_migration::prelude::*;

    use super::m20240301_000001_create_customers_table::Customers;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_delivery_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryOrders::Address).string().null())
                        .col(
                            ColumnDef::new(DeliveryOrders::InternalNotes)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(DeliveryOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryOrders::DeletedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_orders_customer")
                                .from(DeliveryOrders::Table, DeliveryOrders::CustomerId)
                                .to(Customers::Table, Customers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_delivery_orders_customer_id")
                        .table(DeliveryOrders::Table)
                        .col(DeliveryOrders::CustomerId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_delivery_orders_status")
                        .table(DeliveryOrders::Table)
                        .col(DeliveryOrders::Status)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum DeliveryOrders {
        Table,
        Id,
        CustomerId,
        Address,
        InternalNotes,
        Status,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_delivery_order_lines_table {

    use sea_orm_migration::prelude::*;

    use super::m20240301_000002_create_items_table::Items;
    use super::m20240301_000004_create_delivery_orders_table::DeliveryOrders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_delivery_order_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderLines::DeliveryOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderLines::ItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderLines::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrderLines::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_order_lines_order")
                                .from(
                                    DeliveryOrderLines::Table,
                                    DeliveryOrderLines::DeliveryOrderId,
                                )
                                .to(DeliveryOrders::Table, DeliveryOrders::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_order_lines_item")
                                .from(DeliveryOrderLines::Table, DeliveryOrderLines::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_delivery_order_lines_order_id")
                        .table(DeliveryOrderLines::Table)
                        .col(DeliveryOrderLines::DeliveryOrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryOrderLines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum DeliveryOrderLines {
        Table,
        Id,
        DeliveryOrderId,
        ItemId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000006_create_shipments_table {

    use sea_orm_migration::prelude::*;

    use super::m20240301_000001_create_customers_table::Customers;
    use super::m20240301_000003_create_fleets_table::Fleets;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipments::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::FleetId).uuid().null())
                        .col(ColumnDef::new(Shipments::LicensePlate).string().null())
                        .col(ColumnDef::new(Shipments::Address).string().null())
                        .col(ColumnDef::new(Shipments::InternalNotes).string().null())
                        .col(ColumnDef::new(Shipments::ProofOfPickup).string().null())
                        .col(ColumnDef::new(Shipments::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Shipments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Shipments::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_customer")
                                .from(Shipments::Table, Shipments::CustomerId)
                                .to(Customers::Table, Customers::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_fleet")
                                .from(Shipments::Table, Shipments::FleetId)
                                .to(Fleets::Table, Fleets::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_shipments_customer_id")
                        .table(Shipments::Table)
                        .col(Shipments::CustomerId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Shipments {
        Table,
        Id,
        CustomerId,
        FleetId,
        LicensePlate,
        Address,
        InternalNotes,
        ProofOfPickup,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000007_create_allocations_table {

    use sea_orm_migration::prelude::*;

    use super::m20240301_000005_create_delivery_order_lines_table::DeliveryOrderLines;
    use super::m20240301_000006_create_shipments_table::Shipments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_allocations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Allocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Allocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Allocations::DeliveryOrderLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Allocations::ShipmentId).uuid().not_null())
                        .col(
                            ColumnDef::new(Allocations::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Allocations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Allocations::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_allocations_line")
                                .from(Allocations::Table, Allocations::DeliveryOrderLineId)
                                .to(DeliveryOrderLines::Table, DeliveryOrderLines::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_allocations_shipment")
                                .from(Allocations::Table, Allocations::ShipmentId)
                                .to(Shipments::Table, Shipments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_allocations_line_id")
                        .table(Allocations::Table)
                        .col(Allocations::DeliveryOrderLineId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_allocations_shipment_id")
                        .table(Allocations::Table)
                        .col(Allocations::ShipmentId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Allocations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Allocations {
        Table,
        Id,
        DeliveryOrderLineId,
        ShipmentId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000008_create_audit_logs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000008_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogs::EntityType).string().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).uuid().not_null())
                        .col(ColumnDef::new(AuditLogs::ActorId).uuid().not_null())
                        .col(ColumnDef::new(AuditLogs::ChangeType).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Details).string().not_null())
                        .col(ColumnDef::new(AuditLogs::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_audit_logs_entity")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::EntityType)
                        .col(AuditLogs::EntityId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum AuditLogs {
        Table,
        Id,
        EntityType,
        EntityId,
        ActorId,
        ChangeType,
        Details,
        CreatedAt,
    }
}
