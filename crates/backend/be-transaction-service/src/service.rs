use std::sync::Arc;

use be_authz::{JwtConfig, RateLimit, RateLimitPolicy, Role};
use be_remote_db::SharedStore;
use tracing::debug;
use uuid::Uuid;

use crate::analytics::{self, AdminAnalytics, MerchantAnalytics};
use crate::error::TransactionError;
use crate::types::{TransactionView, Viewer};

pub struct AppState {
    pub store: SharedStore,
    pub jwt_config: Arc<JwtConfig>,
    pub general_rate_limit: RateLimit,
    pub analytics_rate_limit: RateLimit,
}

impl AppState {
    pub fn new(store: SharedStore, jwt_config: Arc<JwtConfig>) -> Self {
        Self {
            store,
            jwt_config,
            general_rate_limit: RateLimit::new(RateLimitPolicy::GENERAL),
            analytics_rate_limit: RateLimit::new(RateLimitPolicy::ANALYTICS),
        }
    }

    pub fn with_rate_limits(
        mut self,
        general: RateLimitPolicy,
        analytics: RateLimitPolicy,
    ) -> Self {
        self.general_rate_limit = RateLimit::new(general);
        self.analytics_rate_limit = RateLimit::new(analytics);
        self
    }

    /// Fetches a transaction by its public id, shaped for the caller.
    /// Admins see everything. Merchants and customers see only the
    /// transactions they are a party to.
    pub async fn lookup(
        &self,
        caller: Uuid,
        role: Role,
        transaction_id: &str,
    ) -> Result<TransactionView, TransactionError> {
        let txn = match self.store.get_transaction(transaction_id).await {
            Ok(txn) => txn,
            Err(e) if e.is_not_found() => return Err(TransactionError::TransactionNotFound),
            Err(e) => return Err(e.into()),
        };

        let viewer = match role {
            Role::Admin => Viewer::Admin,
            Role::Merchant if txn.merchant_id == caller => Viewer::Merchant,
            Role::User if txn.customer_id == caller => Viewer::Customer,
            _ => {
                debug!(%caller, transaction_id, "Transaction access denied");
                return Err(TransactionError::AccessDenied);
            }
        };

        let accounts = self
            .store
            .get_users(&[txn.merchant_id, txn.customer_id])
            .await?;
        Ok(TransactionView::new(txn, viewer, &accounts))
    }

    /// Merchants get their own analytics. Admins must name the merchant.
    pub async fn merchant_analytics(
        &self,
        caller: Uuid,
        role: Role,
        requested: Option<&str>,
    ) -> Result<MerchantAnalytics, TransactionError> {
        let merchant_id = match role {
            Role::Admin => requested
                .and_then(|id| Uuid::parse_str(id.trim()).ok())
                .ok_or(TransactionError::MerchantIdRequired)?,
            _ => caller,
        };

        let merchant = match self.store.get_user(merchant_id).await {
            Ok(user) if user.role == Role::Merchant => user,
            Ok(_) => return Err(TransactionError::MerchantNotFound),
            Err(e) if e.is_not_found() => return Err(TransactionError::MerchantNotFound),
            Err(e) => return Err(e.into()),
        };

        let transactions = self
            .store
            .list_transactions_for_merchant(merchant.id)
            .await?;
        Ok(analytics::merchant_analytics(&merchant, &transactions))
    }

    pub async fn admin_analytics(&self) -> Result<AdminAnalytics, TransactionError> {
        let users = self.store.list_users_by_role(Role::User).await?;
        let merchants = self.store.list_users_by_role(Role::Merchant).await?;
        let transactions = self.store.list_transactions().await?;
        let cards = self.store.list_cards().await?;
        Ok(analytics::admin_analytics(
            &users,
            &merchants,
            &transactions,
            &cards,
        ))
    }
}

#[cfg(test)]
mod tests {
    use be_remote_db::{
        CardKind, ExpiryDate, MemoryStore, NewCard, NewTransaction, NewUser, Store,
        TransactionStatus, User,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    struct Fixture {
        state: AppState,
        store: Arc<MemoryStore>,
        merchant: User,
        customer: User,
    }

    async fn user(store: &MemoryStore, name: &str, role: Role) -> User {
        store
            .create_user(
                NewUser::builder()
                    .name(name)
                    .email(format!("{}@example.com", name.to_lowercase()))
                    .role(role)
                    .password_hash("hash")
                    .build(),
            )
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let merchant = user(&store, "Shop", Role::Merchant).await;
        let customer = user(&store, "Ada", Role::User).await;

        let card = store
            .create_card(
                NewCard::builder()
                    .user_id(customer.id)
                    .card_number("123456789012")
                    .card_holder_name("Ada")
                    .expiry_date(ExpiryDate::years_after(Utc::now(), 1))
                    .cvv("123")
                    .max_limit(dec!(10000))
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(card.kind, CardKind::Virtual);

        store
            .create_transaction(
                NewTransaction::builder()
                    .transaction_id("TXN1")
                    .amount(dec!(42))
                    .card_id(card.id)
                    .card_number(card.card_number.clone())
                    .card_holder_name(card.card_holder_name.clone())
                    .merchant_id(merchant.id)
                    .merchant_name(merchant.name.clone())
                    .customer_id(customer.id)
                    .customer_name(customer.name.clone())
                    .status(TransactionStatus::Completed)
                    .description("Coffee")
                    .timestamp(Utc::now())
                    .build(),
            )
            .await
            .unwrap();

        let jwt = Arc::new(JwtConfig::from_secrets(b"access", b"refresh"));
        Fixture {
            state: AppState::new(store.clone(), jwt),
            store,
            merchant,
            customer,
        }
    }

    #[tokio::test]
    async fn views_depend_on_the_caller() {
        let f = fixture().await;
        let admin = user(&f.store, "Root", Role::Admin).await;

        let view = f.state.lookup(admin.id, Role::Admin, "TXN1").await.unwrap();
        assert!(view.card.is_some());
        assert_eq!(view.merchant.unwrap().email.as_deref(), Some("shop@example.com"));

        let view = f
            .state
            .lookup(f.merchant.id, Role::Merchant, "TXN1")
            .await
            .unwrap();
        assert!(view.card.is_none() && view.merchant.is_none());
        assert_eq!(view.customer.unwrap().name, "Ada");

        let view = f
            .state
            .lookup(f.customer.id, Role::User, "TXN1")
            .await
            .unwrap();
        assert!(view.customer.is_none());
        assert_eq!(view.merchant.unwrap().id, f.merchant.id);
    }

    #[tokio::test]
    async fn strangers_are_denied_and_unknown_ids_missing() {
        let f = fixture().await;
        let other_shop = user(&f.store, "Other", Role::Merchant).await;

        assert!(matches!(
            f.state.lookup(other_shop.id, Role::Merchant, "TXN1").await,
            Err(TransactionError::AccessDenied)
        ));
        // A user id that happens to match the merchant is still not the customer.
        assert!(matches!(
            f.state.lookup(f.merchant.id, Role::User, "TXN1").await,
            Err(TransactionError::AccessDenied)
        ));
        assert!(matches!(
            f.state.lookup(f.customer.id, Role::User, "TXN404").await,
            Err(TransactionError::TransactionNotFound)
        ));
    }

    #[tokio::test]
    async fn admin_must_name_an_existing_merchant() {
        let f = fixture().await;
        let admin = user(&f.store, "Root", Role::Admin).await;

        assert!(matches!(
            f.state.merchant_analytics(admin.id, Role::Admin, None).await,
            Err(TransactionError::MerchantIdRequired)
        ));
        assert!(matches!(
            f.state
                .merchant_analytics(admin.id, Role::Admin, Some("nope"))
                .await,
            Err(TransactionError::MerchantIdRequired)
        ));
        let customer_id = f.customer.id.to_string();
        assert!(matches!(
            f.state
                .merchant_analytics(admin.id, Role::Admin, Some(&customer_id))
                .await,
            Err(TransactionError::MerchantNotFound)
        ));

        let merchant_id = f.merchant.id.to_string();
        let analytics = f
            .state
            .merchant_analytics(admin.id, Role::Admin, Some(&merchant_id))
            .await
            .unwrap();
        assert_eq!(analytics.overview.total_amount, dec!(42));
    }

    #[tokio::test]
    async fn merchant_query_parameter_is_ignored() {
        let f = fixture().await;
        let other_shop = user(&f.store, "Other", Role::Merchant).await;
        let requested = f.merchant.id.to_string();

        let analytics = f
            .state
            .merchant_analytics(other_shop.id, Role::Merchant, Some(&requested))
            .await
            .unwrap();
        assert_eq!(analytics.merchant.id, other_shop.id);
        assert_eq!(analytics.overview.total_transactions, 0);
    }

    #[tokio::test]
    async fn admin_analytics_reads_the_whole_store() {
        let f = fixture().await;
        let analytics = f.state.admin_analytics().await.unwrap();
        assert_eq!(analytics.overview.total_users, 1);
        assert_eq!(analytics.overview.total_merchants, 1);
        assert_eq!(analytics.overview.total_transactions, 1);
        assert_eq!(analytics.card_analysis.total_cards, 1);
        assert_eq!(analytics.user_analysis.users_with_cards, 1);
    }
}
