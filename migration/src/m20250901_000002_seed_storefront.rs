use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use sea_orm::prelude::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use sea_orm_migration::prelude::*;

use freshadmin::entities::{category, customer, order, product};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        if category::Entity::find().one(db).await?.is_some() {
            println!("✅ Storefront already seeded, skipping");
            return Ok(());
        }

        println!("🌱 Seeding storefront...");
        let now = Utc::now().naive_utc();

        let mut categories = Vec::new();
        for (name, description) in [
            ("Coffee", "Beans and ground coffee"),
            ("Tea", "Loose leaf and bags"),
            ("Brewing", "Kettles, grinders and filters"),
        ] {
            let category = category::ActiveModel {
                name: Set(name.to_string()),
                description: Set(Some(description.to_string())),
                ..Default::default()
            }
            .insert(db)
            .await?;
            categories.push(category.id);
        }

        for (name, code, cents, active, category) in [
            ("House Blend", "COF-001", 1250, true, 0),
            ("Ethiopia Guji", "COF-002", 1600, true, 0),
            ("Sencha", "TEA-001", 975, true, 1),
            ("Earl Grey", "TEA-002", 750, false, 1),
            ("Gooseneck Kettle", "BRW-001", 5900, true, 2),
        ] {
            product::ActiveModel {
                name: Set(name.to_string()),
                code: Set(code.to_string()),
                price: Set(Decimal::new(cents, 2)),
                description: Set(None),
                active: Set(active),
                category_id: Set(categories[category]),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }

        println!("✅ Seeded catalog");

        let password = hash("secret", DEFAULT_COST)
            .map_err(|e| DbErr::Custom(format!("Failed to hash password: {}", e)))?;

        let mut customers = Vec::new();
        for (name, email, vip) in [
            ("Ada Lovelace", "ada@example.com", true),
            ("Grace Hopper", "grace@example.com", false),
            ("Alan Turing", "alan@example.com", false),
        ] {
            let customer = customer::ActiveModel {
                name: Set(name.to_string()),
                email: Set(email.to_string()),
                password: Set(password.clone()),
                vip: Set(vip),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            customers.push(customer.id);
        }

        for (number, customer, state, cents) in [
            ("SO-1001", 0, "pending", 2500),
            ("SO-1002", 0, "paid", 11850),
            ("SO-1003", 1, "shipped", 5900),
            ("SO-1004", 2, "pending", 975),
            ("SO-1005", 1, "paid", 3200),
        ] {
            order::ActiveModel {
                number: Set(number.to_string()),
                customer_id: Set(customers[customer]),
                state: Set(state.to_string()),
                total: Set(Decimal::new(cents, 2)),
                notes: Set(None),
                carrier: Set((state == "shipped").then(|| "dhl".to_string())),
                shipped_at: Set((state == "shipped").then_some(now)),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }

        println!("✅ Seeded sales");

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        order::Entity::delete_many().exec(db).await?;
        customer::Entity::delete_many().exec(db).await?;
        product::Entity::delete_many().exec(db).await?;
        category::Entity::delete_many().exec(db).await?;

        println!("🗑️  Storefront data removed");
        Ok(())
    }
}
