use std::collections::HashMap;
use std::sync::Arc;

use be_authz::{JwtConfig, RateLimit, RateLimitPolicy, Role};
use be_remote_db::{Card, ExpiryDate, NewCard, SharedStore};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analytics::{self, CardsOverview};
use crate::error::CardError;
use crate::generator::{
    CARD_MAX_LIMIT, MAX_ACTIVE_CARDS, MAX_CARD_NUMBER_ATTEMPTS, random_card_number, random_cvv,
};

pub struct AppState {
    pub store: SharedStore,
    pub jwt_config: Arc<JwtConfig>,
    pub card_rate_limit: RateLimit,
    pub analytics_rate_limit: RateLimit,
}

impl AppState {
    pub fn new(store: SharedStore, jwt_config: Arc<JwtConfig>) -> Self {
        Self {
            store,
            jwt_config,
            card_rate_limit: RateLimit::new(RateLimitPolicy::CARD),
            analytics_rate_limit: RateLimit::new(RateLimitPolicy::ANALYTICS),
        }
    }

    pub fn with_rate_limits(mut self, card: RateLimitPolicy, analytics: RateLimitPolicy) -> Self {
        self.card_rate_limit = RateLimit::new(card);
        self.analytics_rate_limit = RateLimit::new(analytics);
        self
    }

    pub async fn issue_card(&self, user_id: Uuid) -> Result<Card, CardError> {
        self.issue_card_with(user_id, || random_card_number(&mut rand::rng()))
            .await
    }

    /// Issues a card using `next_number` for candidate card numbers. Gives up
    /// after [`MAX_CARD_NUMBER_ATTEMPTS`] candidates that are already taken.
    pub async fn issue_card_with<F>(
        &self,
        user_id: Uuid,
        mut next_number: F,
    ) -> Result<Card, CardError>
    where
        F: FnMut() -> String + Send,
    {
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(CardError::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        if self.store.count_open_cards(user.id).await? >= MAX_ACTIVE_CARDS {
            return Err(CardError::CardLimitReached {
                max_active: MAX_ACTIVE_CARDS,
            });
        }

        let expiry_date = ExpiryDate::years_after(Utc::now(), 1);

        for attempt in 1..=MAX_CARD_NUMBER_ATTEMPTS {
            let card_number = next_number();
            if self.store.card_number_exists(&card_number).await? {
                debug!(attempt, "Card number collision");
                continue;
            }

            let cvv = random_cvv(&mut rand::rng());
            let new_card = NewCard::builder()
                .user_id(user.id)
                .card_number(card_number)
                .card_holder_name(user.name.clone())
                .expiry_date(expiry_date)
                .cvv(cvv)
                .max_limit(CARD_MAX_LIMIT)
                .build();

            match self.store.create_card(new_card).await {
                Ok(card) => {
                    info!(card_id = %card.id, user_id = %user.id, attempt, "Issued virtual card");
                    return Ok(card);
                }
                Err(e) if e.is_duplicate() => {
                    debug!(attempt, "Card number taken concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CardError::CardNumberExhausted {
            attempts: MAX_CARD_NUMBER_ATTEMPTS,
        })
    }

    /// Admins see every card; users only their own. Anything else looks
    /// like a missing card.
    pub async fn get_card(&self, caller: Uuid, role: Role, card_id: &str) -> Result<Card, CardError> {
        let card_id = Uuid::parse_str(card_id).map_err(|_| CardError::CardNotFound)?;
        let card = match self.store.get_card(card_id).await {
            Ok(card) => card,
            Err(e) if e.is_not_found() => return Err(CardError::CardNotFound),
            Err(e) => return Err(e.into()),
        };

        match role {
            Role::Admin => Ok(card),
            Role::User if card.user_id == caller => Ok(card),
            Role::User | Role::Merchant => Err(CardError::CardNotFound),
        }
    }

    pub async fn overview(&self, user_id: Uuid) -> Result<CardsOverview, CardError> {
        let cards = self.store.list_cards_for_user(user_id).await?;

        let outstanding = match self.store.get_user(user_id).await {
            Ok(user) => user.outstanding_amount,
            Err(e) if e.is_not_found() => Decimal::ZERO,
            Err(e) => return Err(e.into()),
        };

        let merchant_ids = analytics::merchant_ids(&cards);
        let merchant_names: HashMap<Uuid, String> = self
            .store
            .get_users(&merchant_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        Ok(analytics::user_overview(&cards, outstanding, &merchant_names))
    }
}

#[cfg(test)]
mod tests {
    use be_remote_db::{MemoryStore, NewUser, Store, User};

    use super::*;

    async fn setup() -> (AppState, User) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(
                NewUser::builder()
                    .name("Ada Lovelace")
                    .email("ada@example.com")
                    .role(Role::User)
                    .password_hash("hash")
                    .build(),
            )
            .await
            .unwrap();
        let state = AppState::new(store, Arc::new(JwtConfig::from_secrets(b"a", b"r")));
        (state, user)
    }

    #[tokio::test]
    async fn issued_card_has_expected_defaults() {
        let (state, user) = setup().await;
        let card = state.issue_card(user.id).await.unwrap();

        assert_eq!(card.card_number.len(), 12);
        assert_eq!(card.cvv.len(), 3);
        assert_eq!(card.card_holder_name, "Ada Lovelace");
        assert_eq!(card.max_limit, CARD_MAX_LIMIT);
        assert_eq!(card.current_balance, Decimal::ZERO);
        assert!(card.is_active && !card.is_used);
        assert_eq!(
            card.expiry_date,
            ExpiryDate::years_after(Utc::now(), 1)
        );
    }

    #[tokio::test]
    async fn sixth_open_card_is_refused() {
        let (state, user) = setup().await;
        for _ in 0..MAX_ACTIVE_CARDS {
            state.issue_card(user.id).await.unwrap();
        }
        let err = state.issue_card(user.id).await.unwrap_err();
        assert!(matches!(err, CardError::CardLimitReached { max_active: 5 }));
    }

    #[tokio::test]
    async fn colliding_numbers_are_skipped() {
        let (state, user) = setup().await;
        let first = state
            .issue_card_with(user.id, || "111111111111".to_string())
            .await
            .unwrap();

        let mut candidates = vec!["222222222222", "111111111111"];
        let second = state
            .issue_card_with(user.id, || candidates.pop().unwrap().to_string())
            .await
            .unwrap();

        assert_eq!(first.card_number, "111111111111");
        assert_eq!(second.card_number, "222222222222");
    }

    #[tokio::test]
    async fn allocation_gives_up_after_bounded_attempts() {
        let (state, user) = setup().await;
        state
            .issue_card_with(user.id, || "111111111111".to_string())
            .await
            .unwrap();

        let mut calls = 0;
        let err = state
            .issue_card_with(user.id, || {
                calls += 1;
                "111111111111".to_string()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CardError::CardNumberExhausted { .. }));
        assert_eq!(calls, MAX_CARD_NUMBER_ATTEMPTS);
        assert_eq!(state.store.list_cards_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn users_only_see_their_own_cards() {
        let (state, owner) = setup().await;
        let card = state.issue_card(owner.id).await.unwrap();
        let id = card.id.to_string();

        assert!(state.get_card(owner.id, Role::User, &id).await.is_ok());
        assert!(state.get_card(Uuid::now_v7(), Role::Admin, &id).await.is_ok());
        assert!(matches!(
            state.get_card(Uuid::now_v7(), Role::User, &id).await,
            Err(CardError::CardNotFound)
        ));
        assert!(matches!(
            state.get_card(owner.id, Role::User, "not-a-uuid").await,
            Err(CardError::CardNotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_user_cannot_be_issued_a_card() {
        let (state, _) = setup().await;
        assert!(matches!(
            state.issue_card(Uuid::now_v7()).await,
            Err(CardError::UserNotFound)
        ));
    }
}
