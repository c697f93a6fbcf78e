use std::sync::Arc;

use be_authz::{JwtConfig, RateLimit, RateLimitPolicy};
use be_remote_db::{SharedStore, Transaction, TransactionMetadata, User};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChargeError;
use crate::policy::ChargePolicy;
use crate::saga::{ChargePlan, ChargeSaga, new_transaction_id};
use crate::types::ChargeRequest;
use crate::validation::{check_card, validate_request};

pub struct AppState {
    pub store: SharedStore,
    pub jwt_config: Arc<JwtConfig>,
    pub policy: ChargePolicy,
    pub charge_rate_limit: RateLimit,
}

impl AppState {
    pub fn new(store: SharedStore, jwt_config: Arc<JwtConfig>, policy: ChargePolicy) -> Self {
        Self {
            store,
            jwt_config,
            policy,
            charge_rate_limit: RateLimit::new(RateLimitPolicy::CHARGE),
        }
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.charge_rate_limit = RateLimit::new(policy);
        self
    }

    async fn load_user(&self, id: Uuid) -> Result<User, ChargeError> {
        match self.store.get_user(id).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_not_found() => Err(ChargeError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Validates `request` against the card it names and, if every check
    /// passes, commits the charge for `merchant_id`.
    pub async fn process_charge(
        &self,
        merchant_id: Uuid,
        request: ChargeRequest,
        metadata: TransactionMetadata,
    ) -> Result<Transaction, ChargeError> {
        let charge = validate_request(request)?;

        let card = match self.store.get_card_by_number(&charge.card_number).await {
            Ok(card) => card,
            Err(e) if e.is_not_found() => return Err(ChargeError::CardNotFound),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        check_card(self.policy, &card, &charge, now)?;

        let merchant = self.load_user(merchant_id).await?;
        let customer = self.load_user(card.user_id).await?;
        debug!(card_id = %card.id, merchant_id = %merchant.id, "Charge validated");

        let plan = ChargePlan {
            transaction_id: new_transaction_id(now, &mut rand::rng()),
            card,
            merchant,
            customer,
            amount: charge.amount,
            description: charge.description,
            metadata,
            timestamp: now,
        };

        let mut saga = ChargeSaga::new(self.store.as_ref(), self.policy);
        Ok(saga.execute(&plan).await?)
    }
}
