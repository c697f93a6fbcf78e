//! Multi-record charge commit with compensation.
//!
//! A charge touches three records that the store cannot update atomically:
//! the transaction log, the card and the customer's outstanding amount. The
//! saga applies them in order and, when a step fails, reverts the steps that
//! already succeeded in reverse order. Compensation is attempted once; a
//! failed reversal is logged and surfaced in [`SagaState::CompensationFailed`].

use std::fmt;

use be_remote_db::{
    Card, CardTransaction, DbError, NewTransaction, Store, Transaction, TransactionMetadata,
    TransactionStatus, User,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::policy::ChargePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    RecordTransaction,
    SettleCard,
    DebitCustomer,
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SagaStep::RecordTransaction => write!(f, "record_transaction"),
            SagaStep::SettleCard => write!(f, "settle_card"),
            SagaStep::DebitCustomer => write!(f, "debit_customer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaState {
    Pending,
    Committed,
    Compensated {
        failed_step: SagaStep,
    },
    CompensationFailed {
        failed_step: SagaStep,
        /// Steps whose effects are still in the store.
        unreverted: Vec<SagaStep>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("charge step {step} failed: {source}")]
pub struct SagaError {
    pub step: SagaStep,
    #[source]
    pub source: DbError,
    pub state: SagaState,
}

/// Everything the saga writes, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct ChargePlan {
    pub card: Card,
    pub merchant: User,
    pub customer: User,
    pub amount: Decimal,
    pub description: String,
    pub metadata: TransactionMetadata,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ChargePlan {
    fn new_transaction(&self) -> NewTransaction {
        NewTransaction::builder()
            .transaction_id(self.transaction_id.clone())
            .amount(self.amount)
            .card_id(self.card.id)
            .card_number(self.card.card_number.clone())
            .card_holder_name(self.card.card_holder_name.clone())
            .merchant_id(self.merchant.id)
            .merchant_name(self.merchant.name.clone())
            .customer_id(self.customer.id)
            .customer_name(self.customer.name.clone())
            .status(TransactionStatus::Completed)
            .description(self.description.clone())
            .timestamp(self.timestamp)
            .metadata(self.metadata.clone())
            .build()
    }

    fn card_summary(&self, txn: &Transaction) -> CardTransaction {
        CardTransaction {
            transaction_id: txn.transaction_id.clone(),
            amount: txn.amount,
            merchant_id: txn.merchant_id,
            timestamp: txn.timestamp,
            status: txn.status,
            description: txn.description.clone(),
        }
    }
}

/// `TXN` + epoch milliseconds + three random digits.
pub fn new_transaction_id<R: Rng + ?Sized>(at: DateTime<Utc>, rng: &mut R) -> String {
    format!("TXN{}{:03}", at.timestamp_millis(), rng.random_range(0..1000u16))
}

#[derive(Debug)]
enum Applied {
    Transaction { id: Uuid },
    Card { snapshot: Box<Card>, stored_version: i64 },
    Debit { customer_id: Uuid, amount: Decimal },
}

impl Applied {
    fn step(&self) -> SagaStep {
        match self {
            Applied::Transaction { .. } => SagaStep::RecordTransaction,
            Applied::Card { .. } => SagaStep::SettleCard,
            Applied::Debit { .. } => SagaStep::DebitCustomer,
        }
    }
}

pub struct ChargeSaga<'a> {
    store: &'a dyn Store,
    policy: ChargePolicy,
    state: SagaState,
    applied: Vec<Applied>,
}

impl<'a> ChargeSaga<'a> {
    pub fn new(store: &'a dyn Store, policy: ChargePolicy) -> Self {
        Self {
            store,
            policy,
            state: SagaState::Pending,
            applied: Vec::new(),
        }
    }

    pub fn state(&self) -> &SagaState {
        &self.state
    }

    /// Runs every step of `plan`. On success the saga is `Committed` and the
    /// stored transaction is returned.
    pub async fn execute(&mut self, plan: &ChargePlan) -> Result<Transaction, SagaError> {
        let txn = match self.store.create_transaction(plan.new_transaction()).await {
            Ok(txn) => txn,
            Err(e) => return Err(self.abort(SagaStep::RecordTransaction, e).await),
        };
        self.applied.push(Applied::Transaction { id: txn.id });

        let settled = self.policy.settle(&plan.card, plan.card_summary(&txn));
        let stored = match self.store.update_card(&settled).await {
            Ok(card) => card,
            Err(e) => return Err(self.abort(SagaStep::SettleCard, e).await),
        };
        self.applied.push(Applied::Card {
            snapshot: Box::new(plan.card.clone()),
            stored_version: stored.version,
        });

        if let Err(e) = self
            .store
            .adjust_outstanding_amount(plan.customer.id, plan.amount)
            .await
        {
            return Err(self.abort(SagaStep::DebitCustomer, e).await);
        }
        self.applied.push(Applied::Debit {
            customer_id: plan.customer.id,
            amount: plan.amount,
        });

        self.state = SagaState::Committed;
        info!(
            transaction_id = %txn.transaction_id,
            card_id = %plan.card.id,
            amount = %plan.amount,
            "Charge committed"
        );
        Ok(txn)
    }

    async fn abort(&mut self, failed_step: SagaStep, source: DbError) -> SagaError {
        warn!(step = %failed_step, error = %source, "Charge step failed, compensating");

        let mut unreverted = Vec::new();
        while let Some(applied) = self.applied.pop() {
            let step = applied.step();
            if let Err(e) = self.compensate(applied).await {
                error!(step = %step, error = %e, "Compensation failed");
                unreverted.push(step);
            }
        }

        self.state = if unreverted.is_empty() {
            SagaState::Compensated { failed_step }
        } else {
            SagaState::CompensationFailed {
                failed_step,
                unreverted,
            }
        };

        SagaError {
            step: failed_step,
            source,
            state: self.state.clone(),
        }
    }

    async fn compensate(&self, applied: Applied) -> Result<(), DbError> {
        match applied {
            Applied::Transaction { id } => self.store.delete_transaction(id).await,
            Applied::Card {
                snapshot,
                stored_version,
            } => {
                let mut restored = *snapshot;
                restored.version = stored_version;
                self.store.update_card(&restored).await.map(|_| ())
            }
            Applied::Debit {
                customer_id,
                amount,
            } => self
                .store
                .adjust_outstanding_amount(customer_id, -amount)
                .await
                .map(|_| ()),
        }
    }
}
